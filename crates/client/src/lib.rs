// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reviewdesk: authenticated session client for the performance-review backend.

pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod session;
pub mod transport;

use std::sync::Arc;

use crate::config::{Cli, Command};
use crate::credential::storage::FileStore;
use crate::credential::store::TokenStore;
use crate::session::{SessionController, SessionStatus, SignupOutcome};
use crate::transport::{ApiClient, ApiRequest};

/// Run one CLI command against the configured backend.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let state_file = cli.client.state_file();
    tracing::debug!(state_file = %state_file.display(), base_url = %cli.client.base_url, "starting");

    let tokens = TokenStore::new(Arc::new(FileStore::new(state_file)));
    let client = Arc::new(ApiClient::new(&cli.client, tokens));
    let session = SessionController::new(client);
    session.restore_session();

    match cli.command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            match user {
                Some(user) => println!("signed in as {}", user.display_name()),
                None => println!("signed in"),
            }
        }
        Command::Signup { name, email, password } => {
            match session.signup(&name, &email, &password).await? {
                SignupOutcome::Authenticated(Some(user)) => {
                    println!("account created, signed in as {}", user.display_name())
                }
                SignupOutcome::Authenticated(None) => println!("account created, signed in"),
                SignupOutcome::Registered { message } => {
                    println!("{}", message.as_deref().unwrap_or("account created"));
                    println!("run `reviewdesk login {email}` to sign in");
                }
            }
        }
        Command::Logout => {
            session.logout().await;
            println!("signed out");
        }
        Command::Whoami => match session.status() {
            SessionStatus::Authenticated => match session.user() {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => println!("signed in (no cached profile)"),
            },
            _ => println!("not signed in"),
        },
        Command::Request { method, path, body, query } => {
            let mut request = ApiRequest::new(method, path);
            for (key, value) in query {
                request = request.with_query(key, value);
            }
            if let Some(body) = body {
                request = request.with_body(serde_json::from_str(&body)?);
            }
            match session.client().execute::<serde_json::Value>(request).await {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(e) if e.requires_sign_in() => {
                    anyhow::bail!("{e}; run `reviewdesk login` to sign in again")
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
