// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Why a token refresh could not produce a new access token.
///
/// Cloned once per queued caller, so every request waiting on the same
/// refresh sees the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("malformed refresh response: {0}")]
    Malformed(String),
    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),
    #[error("refresh abandoned before it settled")]
    Abandoned,
    /// The session was replaced or signed out while the refresh ran.
    #[error("session changed during refresh")]
    Superseded,
}

/// Errors surfaced by the authenticated client and the session façade.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Login or signup rejected; the message is shown to the user as is.
    #[error("{message}")]
    CredentialsRejected { message: String },
    /// The session could not be recovered after a 401.
    #[error("session expired: {0}")]
    Refresh(#[from] RefreshError),
    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialsRejected { .. } => "CREDENTIALS_REJECTED",
            Self::Refresh(_) => "REFRESH_FAILED",
            Self::Status { status: 401, .. } => "UNAUTHORIZED",
            Self::Status { .. } => "BAD_STATUS",
            Self::Transport(_) => "TRANSPORT",
            Self::Decode(_) => "DECODE",
        }
    }

    /// HTTP status carried by the error, if the backend produced one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the session is gone and the user must sign in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Refresh(_) | Self::Status { status: 401, .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
