// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP-Sync API Server
//!
//! Reconciles learning-platform course progress into points, levels and
//! badges.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xp_sync::{
    config::{Config, StoreBackend},
    db::{self, FirestoreDb, MemoryStore, ProgressStore},
    services::{default_catalog, CourseSource, MoodleClient},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        timeout_ms = config.external_timeout.as_millis() as u64,
        per_user_locks = config.sync_user_locks,
        "Starting XP-Sync API"
    );

    let store: Arc<dyn ProgressStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let seeded = db::seed_catalog_if_empty(store.as_ref(), default_catalog()).await?;
    if seeded == 0 {
        tracing::info!("Badge catalog already present");
    }

    let course_source: Arc<dyn CourseSource> = Arc::new(MoodleClient::new(
        config.moodle_url.clone(),
        config.moodle_token.clone(),
        config.external_timeout,
    ));
    tracing::info!(url = %config.moodle_url, "Course source configured");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, course_source));

    // Build router
    let app = xp_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xp_sync=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
