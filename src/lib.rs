// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP-Sync: learning-platform progress reconciliation
//!
//! This crate provides the backend that turns course-completion snapshots
//! from a learning platform into permanent experience points, levels and
//! badges, plus the state machine that animates the result.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod presentation;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ProgressStore;
use services::{CourseSource, SyncService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProgressStore>,
    pub course_source: Arc<dyn CourseSource>,
    pub sync_service: SyncService,
}

impl AppState {
    /// Wire the orchestrator to the given collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn ProgressStore>,
        course_source: Arc<dyn CourseSource>,
    ) -> Self {
        let sync_service = SyncService::new(
            store.clone(),
            course_source.clone(),
            services::SyncSettings::from_config(&config),
        );
        Self {
            config,
            store,
            course_source,
            sync_service,
        }
    }
}
