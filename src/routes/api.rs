// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes: sync entry points, course listing, badges and progress.

use crate::error::{AppError, Result};
use crate::models::{BadgeStatus, CourseProgress, RawCourse, SyncResult, UserBadgeUnlock};
use crate::services::leveling::XpRange;
use crate::services::normalizer::{normalize, normalize_payload, raw_external_points};
use crate::services::{Snapshot, SyncRequest};
use crate::time_utils::format_sync_time;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Upper bound on courses accepted in one snapshot.
const MAX_SNAPSHOT_COURSES: u64 = 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync", post(sync_progress))
        .route("/api/users/{user_id}/refresh", post(refresh_progress))
        .route("/api/users/{user_id}/progress", get(get_progress))
        .route("/api/courses", get(get_courses))
        .route("/api/badges", get(get_badges))
        .route("/api/badges/unlock", post(unlock_badge))
}

/// Run a store call with the configured timeout.
async fn bounded<T>(
    state: &AppState,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(state.config.external_timeout, fut)
        .await
        .map_err(|_| AppError::Timeout(what.to_string()))?
}

/// A degraded sync still returns its fallback state, but with a 500 so
/// callers can tell it apart.
fn sync_response(result: SyncResult) -> (StatusCode, Json<SyncResult>) {
    let status = if result.is_degraded() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(result))
}

// ─── Sync ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SyncBody {
    #[validate(range(min = 1))]
    pub user_id: u64,
    /// Platform course list, already fetched by the caller.
    #[validate(length(max = MAX_SNAPSHOT_COURSES))]
    pub courses: Option<Vec<RawCourse>>,
    /// Fetch the snapshot from the platform instead.
    #[validate(range(min = 1))]
    pub learner_id: Option<u64>,
    /// Points to report if the sync cannot read stored state.
    pub fallback_points: Option<u64>,
}

/// Reconcile a course snapshot for one user.
async fn sync_progress(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncBody>,
) -> Result<(StatusCode, Json<SyncResult>)> {
    body.validate()?;

    let snapshot = match (body.courses, body.learner_id) {
        (Some(courses), _) => Snapshot::Canonical(normalize(courses)),
        (None, Some(learner_id)) => Snapshot::Fetch { learner_id },
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either 'courses' or 'learner_id' is required".to_string(),
            ))
        }
    };

    tracing::debug!(user_id = body.user_id, "Sync requested");

    let result = state
        .sync_service
        .sync(SyncRequest {
            user_id: body.user_id,
            snapshot,
            fallback_points: body.fallback_points,
        })
        .await;

    Ok(sync_response(result))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RefreshBody {
    /// Defaults to the learner ID stored on the account.
    #[validate(range(min = 1))]
    pub learner_id: Option<u64>,
    pub fallback_points: Option<u64>,
}

/// Re-fetch a user's courses from the platform and reconcile.
async fn refresh_progress(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<u64>,
    Json(body): Json<RefreshBody>,
) -> Result<(StatusCode, Json<SyncResult>)> {
    body.validate()?;

    let learner_id = match body.learner_id {
        Some(id) => id,
        None => match bounded(&state, "account read", state.store.get_account(user_id)).await {
            Ok(account) => account.and_then(|a| a.learner_id).ok_or_else(|| {
                AppError::BadRequest(format!("No learner ID known for user {}", user_id))
            })?,
            Err(e) => {
                tracing::error!(
                    user_id,
                    error = %e,
                    "Learner ID lookup failed, returning fallback state"
                );
                let points = body.fallback_points.unwrap_or(0);
                return Ok(sync_response(SyncResult::fallback(points, e.to_string())));
            }
        },
    };

    let result = state
        .sync_service
        .sync_learner(user_id, learner_id, body.fallback_points)
        .await;

    Ok(sync_response(result))
}

// ─── Progress ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProgressResponse {
    pub user_id: u64,
    pub points: u64,
    pub level: u32,
    pub xp: XpRange,
    /// Legacy baseline plus all ledger entries.
    pub ledger_points: u64,
    pub last_sync_at: Option<String>,
}

async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<u64>,
) -> Result<Json<ProgressResponse>> {
    let account = bounded(&state, "account read", state.store.get_account(user_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    let ledger_points = bounded(&state, "ledger read", state.store.ledger_total(user_id)).await?;

    Ok(Json(ProgressResponse {
        user_id,
        points: account.total_points,
        level: account.level,
        xp: XpRange::for_points(account.total_points),
        ledger_points,
        last_sync_at: format_sync_time(account.last_sync_at),
    }))
}

// ─── Courses ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct CoursesQuery {
    learner_id: u64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CoursesResponse {
    pub courses: Vec<CourseProgress>,
    /// Platform point total for this snapshot
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub raw_points: u64,
}

/// Current platform snapshot for a learner, normalized.
///
/// Unlike a sync, platform errors are surfaced to the caller here.
async fn get_courses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoursesQuery>,
) -> Result<Json<CoursesResponse>> {
    let payload = tokio::time::timeout(
        state.config.external_timeout,
        state.course_source.fetch_courses(params.learner_id),
    )
    .await
    .map_err(|_| AppError::Timeout(format!("course query for learner {}", params.learner_id)))??;

    let courses = normalize_payload(&payload);
    let raw_points = raw_external_points(&courses);

    Ok(Json(CoursesResponse {
        courses,
        raw_points,
    }))
}

// ─── Badges ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct BadgesQuery {
    user_id: u64,
}

/// Full badge catalog (inactive entries included, flagged) with the user's
/// unlock status, ordered by badge ID.
async fn get_badges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BadgesQuery>,
) -> Result<Json<Vec<BadgeStatus>>> {
    let catalog = bounded(&state, "badge catalog", state.store.list_badges()).await?;
    let unlocked = bounded(
        &state,
        "unlocked badges",
        state.store.list_unlocked_badge_ids(params.user_id),
    )
    .await?;

    let statuses = catalog
        .into_iter()
        .map(|b| {
            let is_unlocked = unlocked.contains(&b.id);
            BadgeStatus::from_badge(b, is_unlocked)
        })
        .collect();

    Ok(Json(statuses))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UnlockBody {
    #[validate(range(min = 1))]
    pub user_id: u64,
    #[validate(range(min = 1))]
    pub badge_id: u64,
}

#[derive(Serialize)]
pub struct UnlockResponse {
    pub success: bool,
    /// `false` if the badge was already unlocked.
    pub newly_unlocked: bool,
}

/// Unlock a badge outside of a sync.
async fn unlock_badge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UnlockBody>,
) -> Result<Json<UnlockResponse>> {
    body.validate()?;

    let catalog = bounded(&state, "badge catalog", state.store.list_badges()).await?;
    if !catalog.iter().any(|b| b.id == body.badge_id) {
        return Err(AppError::NotFound(format!("Badge {} not found", body.badge_id)));
    }

    let unlock = UserBadgeUnlock {
        user_id: body.user_id,
        badge_id: body.badge_id,
        unlocked_at: chrono::Utc::now(),
    };
    let newly_unlocked =
        bounded(&state, "badge unlock", state.store.unlock_badge(&unlock)).await?;

    tracing::info!(
        user_id = body.user_id,
        badge_id = body.badge_id,
        newly_unlocked,
        "Manual badge unlock"
    );

    Ok(Json(UnlockResponse {
        success: true,
        newly_unlocked,
    }))
}
