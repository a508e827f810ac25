// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential types and client-side persistence.
//!
//! Tokens and the cached user profile live in a durable key/value store
//! (a JSON file by default, memory in tests). Everything that needs a token
//! goes through [`store::TokenStore`]; nothing else touches the keys.

pub mod storage;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the JSON-serialized [`UserProfile`].
pub const USER_DATA_KEY: &str = "user_data";

/// Bearer token pair issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

/// Role attached to a user profile.
///
/// Only used for display and for the caller's own access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Supervisor,
    #[serde(other)]
    Other,
}

/// Identity of the signed-in user, cached next to the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserProfile {
    /// Best label for display: name, then email, then id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().or(self.email.as_deref()).unwrap_or(&self.id)
    }
}

/// Backend ids arrive as numbers from some endpoints and strings from others.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }
    Ok(match Id::deserialize(d)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// Resolve the state directory for the session file.
///
/// Checks `REVIEWDESK_STATE_DIR`, then `$XDG_STATE_HOME/reviewdesk`,
/// then `$HOME/.local/state/reviewdesk`.
pub fn state_dir() -> PathBuf {
    state_dir_with(|name| std::env::var(name).ok())
}

fn state_dir_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env("REVIEWDESK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = env("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("reviewdesk");
    }
    if let Some(home) = env("HOME") {
        return PathBuf::from(home).join(".local/state/reviewdesk");
    }
    PathBuf::from(".reviewdesk")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
