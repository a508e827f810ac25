// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session controller: login, signup, logout and restore over the client.
//!
//! The only place that changes [`SessionStatus`]. Status transitions:
//!
//! ```text
//! Uninitialized -> Restoring -> Authenticated | Anonymous
//! Anonymous     -> Authenticated        (login / signup with tokens)
//! Authenticated -> Anonymous            (logout, sign-in required)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use crate::credential::{Credentials, UserProfile};
use crate::error::ClientError;
use crate::events::SessionEvent;
use crate::transport::envelope::{error_message, parse_body, unwrap_envelope};
use crate::transport::{ApiClient, ApiRequest};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/users/me";

const LOGIN_FALLBACK: &str = "Login failed. Please check your credentials.";
const SIGNUP_FALLBACK: &str = "Registration failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Restoring,
    Authenticated,
    Anonymous,
}

impl SessionStatus {
    /// Whether restoration has finished, one way or the other.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Authenticated | Self::Anonymous)
    }
}

/// Snapshot of the client-side session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub credentials: Option<Credentials>,
    pub status: SessionStatus,
}

/// Result of a signup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    /// The backend issued tokens; the session is authenticated.
    Authenticated(Option<UserProfile>),
    /// Account created but no tokens issued; call `login` next.
    Registered { message: Option<String> },
}

/// Token-bearing body of a login or signup response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthResponse {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Credentials::new(access.clone(), refresh.clone()))
            }
            _ => None,
        }
    }

    /// Profile embedded in the response; a malformed one is ignored.
    fn user(&self) -> Option<UserProfile> {
        let raw = self.user.clone()?;
        match serde_json::from_value(raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::debug!(err = %e, "ignoring malformed user in auth response");
                None
            }
        }
    }
}

struct State {
    status: SessionStatus,
    user: Option<UserProfile>,
}

pub struct SessionController {
    client: Arc<ApiClient>,
    state: Mutex<State>,
    status_tx: watch::Sender<SessionStatus>,
    signals: Mutex<broadcast::Receiver<SessionEvent>>,
}

impl SessionController {
    pub fn new(client: Arc<ApiClient>) -> Self {
        let signals = Mutex::new(client.subscribe());
        let (status_tx, _) = watch::channel(SessionStatus::Uninitialized);
        Self {
            client,
            state: Mutex::new(State { status: SessionStatus::Uninitialized, user: None }),
            status_tx,
            signals,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Restore the session from storage. Synchronous, no network.
    pub fn restore_session(&self) -> SessionStatus {
        self.transition(SessionStatus::Restoring, None);
        let tokens = self.client.tokens();
        match tokens.read() {
            Some(_) => {
                let user = tokens.profile();
                tracing::debug!(has_profile = user.is_some(), "restored stored session");
                self.transition(SessionStatus::Authenticated, user)
            }
            None => self.transition(SessionStatus::Anonymous, None),
        }
    }

    /// Wait until restoration has settled and return the status.
    pub async fn wait_ready(&self) -> SessionStatus {
        let mut rx = self.status_tx.subscribe();
        let status = match rx.wait_for(|s| s.is_settled()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    pub fn status(&self) -> SessionStatus {
        self.apply_signals();
        self.state.lock().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.apply_signals();
        self.state.lock().user.clone()
    }

    pub fn session(&self) -> Session {
        self.apply_signals();
        let state = self.state.lock();
        let credentials = match state.status {
            SessionStatus::Authenticated => self.client.tokens().read(),
            _ => None,
        };
        Session { user: state.user.clone(), credentials, status: state.status }
    }

    /// Watch status changes, e.g. to gate protected views.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Sign in. On failure the session is left as it was.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Option<UserProfile>, ClientError> {
        self.apply_signals();
        let request = ApiRequest::post(LOGIN_PATH)
            .with_body(json!({ "email": identifier, "password": secret }));
        let auth = self.auth_call(request, LOGIN_FALLBACK).await?;
        let Some(credentials) = auth.credentials() else {
            tracing::warn!("login succeeded without a token pair");
            return Err(ClientError::CredentialsRejected {
                message: auth.message.unwrap_or_else(|| LOGIN_FALLBACK.to_owned()),
            });
        };
        Ok(self.establish(credentials, auth.user()).await)
    }

    /// Register an account. Some backends also sign the user in.
    pub async fn signup(
        &self,
        name: &str,
        identifier: &str,
        secret: &str,
    ) -> Result<SignupOutcome, ClientError> {
        self.apply_signals();
        let request = ApiRequest::post(REGISTER_PATH)
            .with_body(json!({ "name": name, "email": identifier, "password": secret }));
        let auth = self.auth_call(request, SIGNUP_FALLBACK).await?;
        match auth.credentials() {
            Some(credentials) => {
                let user = self.establish(credentials, auth.user()).await;
                Ok(SignupOutcome::Authenticated(user))
            }
            None => {
                tracing::info!("registered, login required");
                Ok(SignupOutcome::Registered { message: auth.message })
            }
        }
    }

    /// Sign out. The local session is always cleared; the backend call is
    /// best effort and its failure is never reported.
    pub async fn logout(&self) {
        let token = self.client.tokens().access_token();
        self.client.tokens().clear();
        self.transition(SessionStatus::Anonymous, None);
        self.client.publish(SessionEvent::LoggedOut);

        let mut request = ApiRequest::post(LOGOUT_PATH);
        if let Some(token) = token {
            request = request.with_bearer(token);
        }
        match self.client.send_once(&request).await {
            Ok(resp) if resp.status().is_success() => tracing::debug!("backend logout acknowledged"),
            Ok(resp) => tracing::debug!(status = %resp.status(), "backend logout rejected"),
            Err(e) => tracing::debug!(err = %e, "backend logout failed"),
        }
    }

    /// Apply sign-in-required signals in the background as they arrive.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut rx = self.client.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => controller.apply(&event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        })
    }

    /// POST to an auth endpoint. Any non-success is a credential rejection.
    async fn auth_call(&self, request: ApiRequest, fallback: &str) -> Result<AuthResponse, ClientError> {
        let resp = self.client.send_once(&request).await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            let message = parse_body(&bytes)
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| fallback.to_owned());
            tracing::debug!(path = %request.path, status = status.as_u16(), "credentials rejected");
            return Err(ClientError::CredentialsRejected { message });
        }

        let body = unwrap_envelope(parse_body(&bytes)?);
        if body.is_null() {
            return Ok(AuthResponse::default());
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn establish(&self, credentials: Credentials, user: Option<UserProfile>) -> Option<UserProfile> {
        let tokens = self.client.tokens();
        tokens.write(&credentials, user.as_ref());
        let user = match user {
            Some(user) => Some(user),
            None => {
                let fetched = self.fetch_profile().await;
                if let Some(ref profile) = fetched {
                    tokens.store_profile(profile);
                }
                fetched
            }
        };
        let user_id = user.as_ref().map(|u| u.id.clone());
        tracing::info!(user_id = user_id.as_deref().unwrap_or("-"), "signed in");
        self.transition(SessionStatus::Authenticated, user.clone());
        self.client.publish(SessionEvent::LoggedIn { user_id });
        user
    }

    /// Profile lookup after login. Failures degrade to `None`.
    async fn fetch_profile(&self) -> Option<UserProfile> {
        match self.client.get::<UserProfile>(PROFILE_PATH).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(err = %e, "profile fetch failed, continuing without profile");
                None
            }
        }
    }

    fn apply_signals(&self) {
        let mut rx = self.signals.lock();
        loop {
            match rx.try_recv() {
                Ok(event) => self.apply(&event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    fn apply(&self, event: &SessionEvent) {
        if let SessionEvent::SignInRequired { reason, .. } = event {
            // Signals are raised only once the store holds no session, so
            // stored credentials mean a newer login has since succeeded.
            if self.client.tokens().read().is_some() {
                tracing::debug!(reason = %reason, "ignoring sign-in signal from an earlier session");
                return;
            }
            let was_authenticated = self.state.lock().status == SessionStatus::Authenticated;
            if was_authenticated {
                tracing::info!(reason = %reason, "session ended, sign-in required");
            }
            self.transition(SessionStatus::Anonymous, None);
        }
    }

    fn transition(&self, status: SessionStatus, user: Option<UserProfile>) -> SessionStatus {
        {
            let mut state = self.state.lock();
            state.status = status;
            state.user = user;
        }
        self.status_tx.send_replace(status);
        status
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
