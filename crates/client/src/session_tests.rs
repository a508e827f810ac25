// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::ClientConfig;
use crate::credential::store::TokenStore;
use crate::credential::Role;

fn controller(tokens: TokenStore) -> SessionController {
    // Nothing listens here; these tests never touch the network.
    let config = ClientConfig::new("http://127.0.0.1:9");
    SessionController::new(Arc::new(ApiClient::new(&config, tokens)))
}

fn profile() -> UserProfile {
    UserProfile {
        id: "3".into(),
        name: Some("Quang".into()),
        email: Some("quang@corp.io".into()),
        role: Some(Role::Supervisor),
    }
}

#[test]
fn starts_uninitialized() {
    let session = controller(TokenStore::in_memory());
    assert_eq!(session.status(), SessionStatus::Uninitialized);
    assert!(!session.status().is_settled());
}

#[test]
fn restore_with_stored_tokens_is_authenticated() {
    let tokens = TokenStore::in_memory();
    tokens.write(&Credentials::new("T1", "R1"), Some(&profile()));
    let session = controller(tokens);

    assert_eq!(session.restore_session(), SessionStatus::Authenticated);
    let snapshot = session.session();
    assert_eq!(snapshot.user, Some(profile()));
    assert_eq!(snapshot.credentials, Some(Credentials::new("T1", "R1")));
}

#[test]
fn restore_without_profile_still_authenticates() {
    let tokens = TokenStore::in_memory();
    tokens.write(&Credentials::new("T1", "R1"), None);
    let session = controller(tokens);

    assert_eq!(session.restore_session(), SessionStatus::Authenticated);
    assert_eq!(session.user(), None);
}

#[test]
fn restore_with_empty_store_is_anonymous() {
    let session = controller(TokenStore::in_memory());
    assert_eq!(session.restore_session(), SessionStatus::Anonymous);
    assert_eq!(session.session().credentials, None);
}

#[test]
fn sign_in_required_signal_ends_session() {
    let tokens = TokenStore::in_memory();
    tokens.write(&Credentials::new("T1", "R1"), Some(&profile()));
    let session = controller(tokens.clone());
    session.restore_session();

    tokens.clear();
    session.client().publish(SessionEvent::SignInRequired {
        reason: "refresh rejected".into(),
        cleared: true,
    });
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(session.user(), None);
}

#[test]
fn sign_in_signal_raised_before_a_new_login_is_ignored() {
    let tokens = TokenStore::in_memory();
    let session = controller(tokens.clone());
    session.restore_session();

    // Raised while signed out, drained only after credentials were stored.
    session.client().publish(SessionEvent::SignInRequired {
        reason: "no refresh token stored".into(),
        cleared: false,
    });
    tokens.write(&Credentials::new("T1", "R1"), Some(&profile()));
    session.restore_session();

    assert_eq!(session.status(), SessionStatus::Authenticated);
    assert_eq!(session.user(), Some(profile()));
}

#[test]
fn own_login_events_do_not_change_status() {
    let session = controller(TokenStore::in_memory());
    session.restore_session();
    session.client().publish(SessionEvent::LoggedIn { user_id: None });
    assert_eq!(session.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn wait_ready_resolves_after_restore() -> anyhow::Result<()> {
    let session = Arc::new(controller(TokenStore::in_memory()));
    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.wait_ready().await })
    };
    tokio::task::yield_now().await;
    session.restore_session();
    assert_eq!(waiter.await?, SessionStatus::Anonymous);
    Ok(())
}

#[tokio::test]
async fn logout_clears_even_when_backend_is_unreachable() {
    let tokens = TokenStore::in_memory();
    tokens.write(&Credentials::new("T1", "R1"), Some(&profile()));
    let session = controller(tokens.clone());
    session.restore_session();

    session.logout().await;
    assert_eq!(tokens.read(), None);
    assert_eq!(session.status(), SessionStatus::Anonymous);
}

#[test]
fn auth_response_requires_both_tokens() -> anyhow::Result<()> {
    let partial: AuthResponse = serde_json::from_value(json!({"accessToken": "T1"}))?;
    assert_eq!(partial.credentials(), None);

    let full: AuthResponse = serde_json::from_value(json!({
        "accessToken": "T1",
        "refreshToken": "R1",
        "user": {"id": 9, "name": "Hoa"}
    }))?;
    assert_eq!(full.credentials(), Some(Credentials::new("T1", "R1")));
    assert_eq!(full.user().map(|u| u.id), Some("9".to_owned()));
    Ok(())
}

#[test]
fn malformed_embedded_user_is_ignored() -> anyhow::Result<()> {
    let auth: AuthResponse = serde_json::from_value(json!({
        "accessToken": "T1",
        "refreshToken": "R1",
        "user": {"name": "no id"}
    }))?;
    assert_eq!(auth.user(), None);
    Ok(())
}
