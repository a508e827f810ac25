// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token store: the single source of truth for credentials.
//!
//! No operation here returns an error. A backend failure is logged and the
//! store behaves as if there were no session, so a broken disk or a corrupt
//! file sends the user to sign-in instead of crashing the caller.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::credential::storage::{KeyValueStore, MemoryStore};
use crate::credential::{Credentials, UserProfile, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_DATA_KEY};

#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    /// Serializes multi-key changes across clones.
    guard: Arc<Mutex<()>>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend, guard: Arc::new(Mutex::new(())) }
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Both tokens, or `None` if either is missing or storage failed.
    pub fn read(&self) -> Option<Credentials> {
        let access_token = self.get(ACCESS_TOKEN_KEY)?;
        let refresh_token = self.get(REFRESH_TOKEN_KEY)?;
        Some(Credentials { access_token, refresh_token })
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    /// Cached profile. Unparseable JSON counts as absent.
    pub fn profile(&self) -> Option<UserProfile> {
        let raw = self.get(USER_DATA_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(err = %e, "ignoring unparseable cached profile");
                None
            }
        }
    }

    /// Persist both tokens, and the profile when given, in one backend write.
    /// Without a profile, any previously cached one is dropped.
    pub fn write(&self, credentials: &Credentials, profile: Option<&UserProfile>) {
        let profile_json = profile.and_then(|p| match serde_json::to_string(p) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(err = %e, "failed to serialize profile");
                None
            }
        });
        let _guard = self.guard.lock();
        let mut entries = vec![
            (ACCESS_TOKEN_KEY, credentials.access_token.as_str()),
            (REFRESH_TOKEN_KEY, credentials.refresh_token.as_str()),
        ];
        if let Some(ref json) = profile_json {
            entries.push((USER_DATA_KEY, json.as_str()));
        }
        if let Err(e) = self.backend.set_many(&entries) {
            tracing::warn!(err = %e, "failed to persist credentials");
        }
        // A profile cached for an earlier session must not outlive it.
        if profile_json.is_none() {
            if let Err(e) = self.backend.remove_many(&[USER_DATA_KEY]) {
                tracing::warn!(err = %e, "failed to drop cached profile");
            }
        }
    }

    pub fn store_profile(&self, profile: &UserProfile) {
        match serde_json::to_string(profile) {
            Ok(json) => self.set(USER_DATA_KEY, &json),
            Err(e) => tracing::warn!(err = %e, "failed to serialize profile"),
        }
    }

    /// Replace the access token only; refresh token and profile are kept.
    pub fn update_access_token(&self, token: &str) {
        let _guard = self.guard.lock();
        self.set(ACCESS_TOKEN_KEY, token);
    }

    /// Replace the refresh token only, for backends that rotate it.
    pub fn update_refresh_token(&self, token: &str) {
        let _guard = self.guard.lock();
        self.set(REFRESH_TOKEN_KEY, token);
    }

    /// Store the result of a refresh made with `issued_for`.
    ///
    /// Returns false, writing nothing, when the stored refresh token is no
    /// longer `issued_for` (logout or a new login happened meanwhile).
    pub fn apply_refresh(&self, issued_for: &str, access_token: &str, rotated: Option<&str>) -> bool {
        let _guard = self.guard.lock();
        if self.get(REFRESH_TOKEN_KEY).as_deref() != Some(issued_for) {
            return false;
        }
        let mut entries = vec![(ACCESS_TOKEN_KEY, access_token)];
        if let Some(rotated) = rotated {
            entries.push((REFRESH_TOKEN_KEY, rotated));
        }
        if let Err(e) = self.backend.set_many(&entries) {
            tracing::warn!(err = %e, "failed to persist refreshed token");
        }
        true
    }

    /// Remove tokens and profile. Safe to call on an empty store.
    pub fn clear(&self) {
        let _guard = self.guard.lock();
        self.clear_locked();
    }

    /// Clear only while `refresh_token` is still the stored one.
    pub fn clear_if(&self, refresh_token: &str) -> bool {
        let _guard = self.guard.lock();
        if self.get(REFRESH_TOKEN_KEY).as_deref() != Some(refresh_token) {
            return false;
        }
        self.clear_locked();
        true
    }

    fn clear_locked(&self) {
        if let Err(e) = self.backend.remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_DATA_KEY])
        {
            tracing::warn!(err = %e, "failed to clear stored session");
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, err = %e, "session storage unavailable");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            tracing::warn!(key, err = %e, "failed to persist session value");
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
