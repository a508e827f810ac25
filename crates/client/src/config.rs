// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for the review backend.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the backend API (e.g. `https://reviews.example.com/api`).
    #[arg(long, env = "REVIEWDESK_API_BASE_URL")]
    pub base_url: String,

    /// Session file holding tokens and the cached profile.
    #[arg(long, env = "REVIEWDESK_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Timeout for each backend request in milliseconds.
    #[arg(long, default_value_t = 30000, env = "REVIEWDESK_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Upper bound on a token refresh call in milliseconds.
    #[arg(long, default_value_t = 15000, env = "REVIEWDESK_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,
}

impl ClientConfig {
    /// Config with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state_file: None,
            request_timeout_ms: 30000,
            refresh_timeout_ms: 15000,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(|| crate::credential::state_dir().join("session.json"))
    }
}

/// Command-line client for the performance-review backend.
#[derive(Debug, clap::Parser)]
#[command(name = "reviewdesk", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub client: ClientConfig,

    /// Log filter (tracing `EnvFilter` syntax). `RUST_LOG` wins when set.
    #[arg(long, default_value = "warn", env = "REVIEWDESK_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text", env = "REVIEWDESK_LOG_FORMAT")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Sign in and store the session.
    Login {
        email: String,
        #[arg(long, env = "REVIEWDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account; signs in if the backend issues tokens.
    Signup {
        name: String,
        email: String,
        #[arg(long, env = "REVIEWDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Send an authenticated request and print the JSON response.
    Request {
        #[arg(value_parser = parse_method)]
        method: reqwest::Method,
        /// Path relative to the base URL, e.g. `/criteria`.
        path: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
        /// Query parameter as `key=value`; repeatable.
        #[arg(long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },
}

fn parse_method(s: &str) -> Result<reqwest::Method, String> {
    reqwest::Method::from_bytes(s.to_uppercase().as_bytes()).map_err(|e| e.to_string())
}

fn parse_query_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_owned(), v.to_owned())),
        _ => Err(format!("expected key=value, got `{s}`")),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
