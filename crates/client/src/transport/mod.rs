// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP client for the review backend.
//!
//! Every request is decorated by the [`auth::RequestAuthenticator`]. A 401 on
//! a request that has not been replayed yet is handed to the
//! [`refresh::RefreshCoordinator`]; the request is then replayed once with
//! the refreshed token. A second 401 is returned to the caller.

pub mod auth;
pub mod envelope;
pub mod refresh;

use std::sync::{Arc, Once};

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::credential::store::TokenStore;
use crate::error::ClientError;
use crate::events::SessionEvent;
use crate::transport::auth::RequestAuthenticator;
use crate::transport::refresh::{HttpRefresher, RefreshCoordinator, TokenRefresher};

/// A replayable description of one backend call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Token pinned for this request instead of the stored one.
    bearer: Option<String>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, bearer: None, retried: false }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send with this token regardless of what the store holds.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// True once the request has been replayed after a refresh.
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    tokens: TokenStore,
    authenticator: RequestAuthenticator,
    coordinator: RefreshCoordinator,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Self {
        let refresher = Arc::new(HttpRefresher::new(build_http(config), &config.base_url));
        Self::with_refresher(config, tokens, refresher)
    }

    /// Client with a custom refresh call, e.g. for a different auth backend.
    pub fn with_refresher(
        config: &ClientConfig,
        tokens: TokenStore,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        let coordinator = RefreshCoordinator::new(
            tokens.clone(),
            refresher,
            config.refresh_timeout(),
            events.clone(),
        );
        Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            http: build_http(config),
            authenticator: RequestAuthenticator::new(tokens.clone()),
            tokens,
            coordinator,
            events,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Subscribe to session events (sign-in required, login, logout).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// One round trip: authenticate and send, whatever the status.
    ///
    /// Used for the auth endpoints, which must not trigger a refresh.
    pub async fn send_once(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let mut req = self.http.request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        let req = self.authenticator.authorize(req, request.bearer.as_deref());
        Ok(req.send().await?)
    }

    /// Send with one-shot recovery from an expired access token.
    ///
    /// Returns the response only on success; any other status becomes
    /// [`ClientError::Status`].
    pub async fn send(&self, mut request: ApiRequest) -> Result<reqwest::Response, ClientError> {
        let resp = self.send_once(&request).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || request.retried {
            return check_status(resp).await;
        }

        request.retried = true;
        tracing::debug!(method = %request.method, path = %request.path, "401, recovering session");
        let token = self.coordinator.handle_auth_failure().await?;
        request.bearer = Some(token);

        let resp = self.send_once(&request).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "replay after refresh still unauthorized");
        }
        check_status(resp).await
    }

    /// Send and decode the (envelope-unwrapped) JSON body.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let resp = self.send(request).await?;
        let bytes = resp.bytes().await?;
        let value = envelope::unwrap_envelope(envelope::parse_body(&bytes)?);
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(ApiRequest::post(path).with_body(serde_json::to_value(body)?)).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(ApiRequest::new(Method::PUT, path).with_body(serde_json::to_value(body)?)).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(ApiRequest::new(Method::PATCH, path).with_body(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::new(Method::DELETE, path)).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

/// Install the rustls crypto provider; reqwest needs one even for plain HTTP.
pub fn ensure_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn build_http(config: &ClientConfig) -> reqwest::Client {
    ensure_crypto_provider();
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .unwrap_or_default()
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(envelope::status_error(resp).await)
    }
}
