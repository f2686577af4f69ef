// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xp_sync::config::Config;
use xp_sync::db::{FirestoreDb, MemoryStore, ProgressStore};
use xp_sync::error::AppError;
use xp_sync::models::CourseProgress;
use xp_sync::routes::create_router;
use xp_sync::services::{default_catalog, CourseSource, SyncService, SyncSettings};
use xp_sync::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Timeout used by test services; short so hang tests finish quickly.
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_millis(200);

/// What the stub course source does when queried.
#[allow(dead_code)]
#[derive(Clone)]
pub enum SourceBehavior {
    Payload(Value),
    Fail,
    Hang,
}

/// Course source returning canned payloads.
pub struct StaticCourseSource {
    behavior: Mutex<SourceBehavior>,
}

#[allow(dead_code)]
impl StaticCourseSource {
    pub fn new(payload: Value) -> Self {
        Self {
            behavior: Mutex::new(SourceBehavior::Payload(payload)),
        }
    }

    pub fn set(&self, behavior: SourceBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl CourseSource for StaticCourseSource {
    async fn fetch_courses(&self, _learner_id: u64) -> Result<Value, AppError> {
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            SourceBehavior::Payload(payload) => Ok(payload),
            SourceBehavior::Fail => Err(AppError::CourseSource("HTTP 503".to_string())),
            SourceBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }
        }
    }
}

/// Platform-shaped course entry.
#[allow(dead_code)]
pub fn platform_course(id: u64, name: &str, progress: f64) -> Value {
    json!({ "id": id, "shortname": name, "fullname": name, "progress": progress })
}

#[allow(dead_code)]
pub fn course(course_id: u64, percent: u8) -> CourseProgress {
    CourseProgress {
        course_id,
        name: format!("Course {}", course_id),
        percent,
    }
}

/// In-memory store with the default badge catalog.
#[allow(dead_code)]
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for badge in default_catalog() {
        store.upsert_badge(&badge).await.unwrap();
    }
    store
}

/// Orchestrator over the given store and source.
#[allow(dead_code)]
pub fn test_service(
    store: MemoryStore,
    source: Arc<StaticCourseSource>,
    serialize_per_user: bool,
) -> SyncService {
    SyncService::new(
        Arc::new(store),
        source,
        SyncSettings {
            external_timeout: TEST_TIMEOUT,
            serialize_per_user,
        },
    )
}

/// Test app with an in-memory store and a stub course source.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub source: Arc<StaticCourseSource>,
}

#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let mut config = Config::test_default();
    config.external_timeout = TEST_TIMEOUT;

    let store = seeded_store().await;
    let source = Arc::new(StaticCourseSource::new(json!([])));
    let store_dyn: Arc<dyn ProgressStore> = Arc::new(store.clone());
    let source_dyn: Arc<dyn CourseSource> = source.clone();

    let state = Arc::new(AppState::new(config, store_dyn, source_dyn));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        source,
    }
}
