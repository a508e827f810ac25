// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! When a request comes back 401, [`RefreshCoordinator::handle_auth_failure`]
//! either performs the refresh (the first caller) or parks the caller in a
//! FIFO queue until that refresh settles. Every parked caller receives the
//! same outcome, so N concurrent 401s cost exactly one refresh call.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::{broadcast, oneshot};

use crate::credential::store::TokenStore;
use crate::error::RefreshError;
use crate::events::SessionEvent;
use crate::transport::envelope::{error_message, parse_body, unwrap_envelope};

/// Path of the refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Tokens returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Present only when the backend rotates refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The network call that trades a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

/// Refresher that POSTs `{"refreshToken": ...}` to the backend.
///
/// Uses its own plain client: the refresh call must never pass through the
/// authenticated pipeline it is repairing.
pub struct HttpRefresher {
    http: reqwest::Client,
    url: String,
}

impl HttpRefresher {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self { http, url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH) }
    }
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = parse_body(&bytes)
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("refresh failed").to_owned());
            return Err(RefreshError::Rejected { status: status.as_u16(), message });
        }

        let body = parse_body(&bytes).map_err(|e| RefreshError::Malformed(e.to_string()))?;
        let tokens: RefreshedTokens = serde_json::from_value(unwrap_envelope(body))
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;
        if tokens.access_token.is_empty() {
            return Err(RefreshError::Malformed("empty accessToken".to_owned()));
        }
        Ok(tokens)
    }
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
}

/// Owns the `refreshing` flag and the queue of callers parked behind it.
pub struct RefreshCoordinator {
    tokens: TokenStore,
    refresher: Arc<dyn TokenRefresher>,
    timeout: Duration,
    events: broadcast::Sender<SessionEvent>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        tokens: TokenStore,
        refresher: Arc<dyn TokenRefresher>,
        timeout: Duration,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { tokens, refresher, timeout, events, state: Mutex::new(RefreshState::default()) }
    }

    /// Recover from a 401. Returns the access token to replay with.
    ///
    /// The flag is checked and set in one critical section, before any await.
    pub async fn handle_auth_failure(&self) -> Result<String, RefreshError> {
        let parked = {
            let mut state = self.state.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = parked {
            tracing::debug!("refresh in flight, parking request");
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let mut leader = LeaderGuard { coordinator: self, outcome: None };
        let outcome = self.refresh().await;
        leader.outcome = Some(outcome.clone());
        drop(leader);
        outcome
    }

    async fn refresh(&self) -> Result<String, RefreshError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            tracing::warn!("401 with no refresh token stored, sign-in required");
            self.require_sign_in(&RefreshError::MissingRefreshToken, false);
            return Err(RefreshError::MissingRefreshToken);
        };

        let result = match tokio::time::timeout(self.timeout, self.refresher.refresh(&refresh_token)).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::TimedOut(self.timeout)),
        };

        match result {
            Ok(fresh) => {
                let rotated = fresh.refresh_token.as_deref();
                if !self.tokens.apply_refresh(&refresh_token, &fresh.access_token, rotated) {
                    tracing::info!("session changed during refresh, dropping new token");
                    return Err(RefreshError::Superseded);
                }
                tracing::info!(rotated = rotated.is_some(), "access token refreshed");
                Ok(fresh.access_token)
            }
            Err(e) => {
                if self.tokens.clear_if(&refresh_token) {
                    tracing::warn!(err = %e, "token refresh failed, clearing session");
                    self.require_sign_in(&e, true);
                } else {
                    tracing::debug!(err = %e, "refresh failed for a session that already ended");
                }
                Err(e)
            }
        }
    }

    fn require_sign_in(&self, err: &RefreshError, cleared: bool) {
        // No subscribers is fine: nobody is listening for navigation.
        let _ = self.events.send(SessionEvent::SignInRequired { reason: err.to_string(), cleared });
    }
}

/// Settles the queue when the leader finishes or is dropped mid-refresh.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    outcome: Option<Result<String, RefreshError>>,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(Err(RefreshError::Abandoned));
        let waiters = {
            let mut state = self.coordinator.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };
        if !waiters.is_empty() {
            tracing::debug!(count = waiters.len(), ok = outcome.is_ok(), "releasing parked requests");
        }
        for waiter in waiters {
            // A dropped receiver means that caller gave up; skip it.
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
