// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake of the review backend's auth surface.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use reviewdesk::config::ClientConfig;
use reviewdesk::credential::store::TokenStore;
use reviewdesk::session::SessionController;
use reviewdesk::transport::ApiClient;

pub const PASSWORD: &str = "secret1";

pub struct Backend {
    /// Access token the protected routes accept; `None` rejects everything.
    pub valid_token: Mutex<Option<String>>,
    /// Refresh token the refresh endpoint accepts.
    pub valid_refresh: Mutex<String>,
    /// Access token handed out by the next successful refresh.
    pub next_token: Mutex<String>,
    pub refresh_delay: Mutex<Duration>,
    pub login_delay: Mutex<Duration>,
    pub refresh_calls: AtomicU32,
    pub logout_calls: AtomicU32,
    pub logout_fails: AtomicBool,
    /// `Authorization` headers seen on `/criteria`, in arrival order.
    pub seen_auth: Mutex<Vec<Option<String>>>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(Some("T1".to_owned())),
            valid_refresh: Mutex::new("R1".to_owned()),
            next_token: Mutex::new("T2".to_owned()),
            refresh_delay: Mutex::new(Duration::ZERO),
            login_delay: Mutex::new(Duration::ZERO),
            refresh_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
            logout_fails: AtomicBool::new(false),
            seen_auth: Mutex::new(Vec::new()),
        })
    }

    /// Stop accepting the current access token.
    pub fn expire_access_token(&self) {
        *self.valid_token.lock() = None;
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().clone()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let presented = bearer(headers);
        let valid = self.valid_token.lock().clone();
        matches!((presented, valid), (Some(p), Some(v)) if p == format!("Bearer {v}"))
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized", "status": 401 })))
}

async fn login(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let delay = *b.login_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    match body["password"].as_str() {
        Some(PASSWORD) => {
            *b.valid_token.lock() = Some("T1".to_owned());
            let data = match body["email"].as_str() {
                // Variant whose login response embeds the profile.
                Some("embedded@b.com") => json!({
                    "accessToken": "T1",
                    "refreshToken": "R1",
                    "user": { "id": 2, "name": "Binh", "email": "embedded@b.com", "role": "SUPERVISOR" }
                }),
                _ => json!({ "accessToken": "T1", "refreshToken": "R1" }),
            };
            (StatusCode::OK, Json(json!({ "message": "Login successful", "status": 200, "data": data })))
        }
        Some("silent") => (StatusCode::UNAUTHORIZED, Json(Value::Null)),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password", "status": 401, "data": null })),
        ),
    }
}

async fn register(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["email"].as_str() {
        Some("taken@b.com") => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Email already exists", "status": 409, "data": null })),
        ),
        Some("auto@b.com") => {
            *b.valid_token.lock() = Some("T1".to_owned());
            (
                StatusCode::CREATED,
                Json(json!({
                    "accessToken": "T1",
                    "refreshToken": "R1",
                    "user": { "id": "u-9", "name": body["name"], "email": "auto@b.com" }
                })),
            )
        }
        _ => (
            StatusCode::CREATED,
            Json(json!({ "message": "Registered successfully", "status": 201, "data": null })),
        ),
    }
}

async fn refresh(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    b.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *b.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let expected = b.valid_refresh.lock().clone();
    if body["refreshToken"].as_str() != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid refresh token" })));
    }
    let token = b.next_token.lock().clone();
    *b.valid_token.lock() = Some(token.clone());
    (StatusCode::OK, Json(json!({ "accessToken": token })))
}

async fn logout(State(b): State<Arc<Backend>>) -> StatusCode {
    b.logout_calls.fetch_add(1, Ordering::SeqCst);
    if b.logout_fails.load(Ordering::SeqCst) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn me(State(b): State<Arc<Backend>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !b.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": "ok",
            "status": 200,
            "data": { "id": 1, "name": "An", "email": "a@b.com", "role": "EMPLOYEE" }
        })),
    )
}

async fn criteria(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    b.seen_auth.lock().push(bearer(&headers));
    if !b.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": "ok",
            "status": 200,
            "data": { "items": [{ "criteriaId": 1, "name": "Teamwork", "weight": 30 }], "query": query }
        })),
    )
}

async fn always_unauthorized() -> (StatusCode, Json<Value>) {
    unauthorized()
}

async fn echo(State(b): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !b.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({ "message": "updated", "status": 200, "data": body })))
}

pub fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/users/me", get(me))
        .route("/criteria", get(criteria))
        .route("/criteria/{id}", axum::routing::patch(echo))
        .route("/revoked", get(always_unauthorized))
        .with_state(backend)
}

/// Serve the fake backend on an ephemeral port; returns its base URL.
pub async fn spawn(backend: &Arc<Backend>) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(Arc::clone(backend));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

pub fn client(base_url: &str, tokens: &TokenStore) -> Arc<ApiClient> {
    let mut config = ClientConfig::new(base_url);
    config.request_timeout_ms = 5000;
    config.refresh_timeout_ms = 5000;
    Arc::new(ApiClient::new(&config, tokens.clone()))
}

pub fn session(base_url: &str, tokens: &TokenStore) -> SessionController {
    SessionController::new(client(base_url, tokens))
}
