// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request authenticator: bearer decoration for outgoing requests.

use reqwest::RequestBuilder;

use crate::credential::store::TokenStore;

/// Attaches `Authorization: Bearer <token>` to every outgoing request.
///
/// Pure decoration: never blocks, never retries. Without a token the
/// request goes out unauthenticated and the backend decides.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    tokens: TokenStore,
}

impl RequestAuthenticator {
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }

    /// Token for one request: the pinned token if any, else the stored one.
    pub fn token_for(&self, pinned: Option<&str>) -> Option<String> {
        match pinned {
            Some(token) => Some(token.to_owned()),
            None => self.tokens.access_token(),
        }
    }

    pub fn authorize(&self, req: RequestBuilder, pinned: Option<&str>) -> RequestBuilder {
        match self.token_for(pinned) {
            Some(token) => req.bearer_auth(token),
            None => {
                tracing::trace!("no access token, sending unauthenticated");
                req
            }
        }
    }
}
