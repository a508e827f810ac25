// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn credentials_rejected_displays_backend_message_verbatim() {
    let err = ClientError::CredentialsRejected { message: "Invalid email or password".into() };
    assert_eq!(err.to_string(), "Invalid email or password");
    assert_eq!(err.as_str(), "CREDENTIALS_REJECTED");
    assert!(!err.requires_sign_in());
}

#[test]
fn replayed_401_is_unauthorized() {
    let err = ClientError::Status { status: 401, message: "token revoked".into() };
    assert_eq!(err.as_str(), "UNAUTHORIZED");
    assert_eq!(err.http_status(), Some(401));
    assert!(err.requires_sign_in());
}

#[test]
fn refresh_rejection_keeps_status() {
    let err = ClientError::from(RefreshError::Rejected { status: 403, message: "expired".into() });
    assert_eq!(err.as_str(), "REFRESH_FAILED");
    assert_eq!(err.http_status(), Some(403));
    assert!(err.requires_sign_in());
    assert_eq!(err.to_string(), "session expired: refresh rejected (403): expired");
}

#[test]
fn other_statuses_do_not_require_sign_in() {
    let err = ClientError::Status { status: 500, message: "boom".into() };
    assert_eq!(err.as_str(), "BAD_STATUS");
    assert!(!err.requires_sign_in());
}
