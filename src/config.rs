// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Credentials for the learning platform are injected here at startup and
//! passed explicitly to the services that need them; nothing is compiled in.

use std::env;
use std::time::Duration;

/// Default bound on any single external call (course source or store).
const DEFAULT_EXTERNAL_TIMEOUT_MS: u64 = 10_000;

/// Which persistent store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store, for local development only.
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Learning platform base URL (e.g. "https://moodle.example.org")
    pub moodle_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Timeout applied to every external call
    pub external_timeout: Duration,
    /// Serialize concurrent syncs of the same user within this process
    pub sync_user_locks: bool,
    pub store_backend: StoreBackend,

    // --- Secrets ---
    /// Learning platform web service token
    pub moodle_token: String,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            moodle_url: "http://localhost:8081".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            external_timeout: Duration::from_millis(DEFAULT_EXTERNAL_TIMEOUT_MS),
            sync_user_locks: true,
            store_backend: StoreBackend::Memory,
            moodle_token: "test_token".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present (local development).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            moodle_url: env::var("MOODLE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("MOODLE_URL"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            external_timeout: Duration::from_millis(
                env::var("EXTERNAL_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_EXTERNAL_TIMEOUT_MS),
            ),
            sync_user_locks: env::var("SYNC_USER_LOCKS")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            store_backend: match env::var("STORE_BACKEND") {
                Ok(v) => parse_backend(&v)?,
                Err(_) => StoreBackend::Firestore,
            },

            moodle_token: env::var("MOODLE_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("MOODLE_TOKEN"))?,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn parse_backend(value: &str) -> Result<StoreBackend, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "firestore" => Ok(StoreBackend::Firestore),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(ConfigError::Invalid {
            name: "STORE_BACKEND",
            value: other.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
