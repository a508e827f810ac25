// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle events for navigation layers.

use serde::{Deserialize, Serialize};

/// Where the user is sent when the session cannot be recovered.
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Events published on the client's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session is gone; the user must go to [`SIGN_IN_PATH`].
    ///
    /// `cleared` is false when no refresh token was stored, in which case
    /// stored state is left for the sign-in flow to overwrite.
    SignInRequired { reason: String, cleared: bool },
    LoggedIn {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    LoggedOut,
}

impl SessionEvent {
    /// Navigation target implied by this event, if any.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::SignInRequired { .. } | Self::LoggedOut => Some(SIGN_IN_PATH),
            Self::LoggedIn { .. } => None,
        }
    }
}
