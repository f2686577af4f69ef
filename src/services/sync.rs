// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress reconciliation orchestrator.
//!
//! Handles the core workflow:
//! 1. Read the cached account projection and full course history
//! 2. Diff the canonical snapshot against history
//! 3. Append one ledger entry if points were earned
//! 4. Compute final points and level
//! 5. Overwrite the account projection
//! 6. Upsert course rows and deactivate missing courses
//! 7. Evaluate badge rules and persist new unlocks
//! 8. Return the result summary
//!
//! Steps are not transactional across documents. The ledger is the source
//! of truth; the account row is a cache that may lag behind it when two
//! syncs for the same user overlap (last write wins). The next sync repairs
//! it from the ledger total. Course rows are merged by the store at write
//! time, so a stale overlapping sync never lowers stored progress.
//!
//! A sync never fails outward: every error is folded into a [`SyncResult`]
//! carrying the best-known state so the caller always has something to show.

use crate::config::Config;
use crate::db::ProgressStore;
use crate::error::AppError;
use crate::models::{CourseProgress, PointsLedgerEntry, SyncResult, UserAccount, UserBadgeUnlock};
use crate::services::badges::{self, BadgeContext};
use crate::services::leveling::level_for_points;
use crate::services::moodle::CourseSource;
use crate::services::normalizer::{normalize_payload, raw_external_points};
use crate::services::reconciler::{apply_upsert, reconcile};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Per-user locks serializing syncs inside this process.
pub type SyncLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Orchestrator settings, injected at construction time.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Bound on every course-source and store call.
    pub external_timeout: Duration,
    /// Serialize syncs of the same user (single process only).
    pub serialize_per_user: bool,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            external_timeout: config.external_timeout,
            serialize_per_user: config.sync_user_locks,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            external_timeout: Duration::from_secs(10),
            serialize_per_user: true,
        }
    }
}

/// Where the course snapshot comes from.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// Pre-fetched canonical snapshot.
    Canonical(Vec<CourseProgress>),
    /// Fetch from the course source by external learner ID.
    Fetch { learner_id: u64 },
}

/// One sync invocation.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub user_id: u64,
    pub snapshot: Snapshot,
    /// Points to report if the baseline cannot be read. Defaults to the
    /// snapshot's raw external point total.
    pub fallback_points: Option<u64>,
}

/// Sequences normalization, reconciliation, leveling and badge rules and
/// commits the outcome. Cheap to clone.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn ProgressStore>,
    courses: Arc<dyn CourseSource>,
    settings: SyncSettings,
    locks: SyncLocks,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        courses: Arc<dyn CourseSource>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            courses,
            settings,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Sync with a pre-fetched snapshot (request-handler entry point).
    pub async fn sync_snapshot(
        &self,
        user_id: u64,
        courses: Vec<CourseProgress>,
        fallback_points: Option<u64>,
    ) -> SyncResult {
        self.sync(SyncRequest {
            user_id,
            snapshot: Snapshot::Canonical(courses),
            fallback_points,
        })
        .await
    }

    /// Sync by fetching the learner's courses (UI-triggered entry point).
    pub async fn sync_learner(
        &self,
        user_id: u64,
        learner_id: u64,
        fallback_points: Option<u64>,
    ) -> SyncResult {
        self.sync(SyncRequest {
            user_id,
            snapshot: Snapshot::Fetch { learner_id },
            fallback_points,
        })
        .await
    }

    /// Fetch and normalize a learner's courses.
    ///
    /// Unreachable, slow or malformed sources yield an empty snapshot.
    pub async fn fetch_snapshot(&self, learner_id: u64) -> Vec<CourseProgress> {
        match self
            .bounded("course query", self.courses.fetch_courses(learner_id))
            .await
        {
            Ok(payload) => normalize_payload(&payload),
            Err(e) => {
                tracing::warn!(
                    learner_id,
                    error = %e,
                    "Course source failed, treating snapshot as empty"
                );
                Vec::new()
            }
        }
    }

    /// Run one sync.
    pub async fn sync(&self, request: SyncRequest) -> SyncResult {
        let (canonical, learner_id) = match request.snapshot {
            Snapshot::Canonical(courses) => (courses, None),
            Snapshot::Fetch { learner_id } => {
                (self.fetch_snapshot(learner_id).await, Some(learner_id))
            }
        };

        let raw_points = raw_external_points(&canonical);
        let fallback_points = request.fallback_points.unwrap_or(raw_points);

        // Held for the whole sync when per-user serialization is enabled.
        let _guard = if self.settings.serialize_per_user {
            let lock = self
                .locks
                .entry(request.user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            Some(lock.lock_owned().await)
        } else {
            None
        };

        self.run(
            request.user_id,
            learner_id,
            &canonical,
            raw_points,
            fallback_points,
        )
        .await
    }

    async fn run(
        &self,
        user_id: u64,
        learner_id: Option<u64>,
        canonical: &[CourseProgress],
        raw_points: u64,
        fallback_points: u64,
    ) -> SyncResult {
        tracing::info!(
            user_id,
            courses = canonical.len(),
            raw_points,
            "Starting progress sync"
        );

        // 1. Baseline: account projection and full course history
        let account = match self
            .bounded("account read", self.store.get_account(user_id))
            .await
        {
            Ok(account) => account.unwrap_or_else(|| UserAccount::new(user_id)),
            Err(e) => return abort_with_fallback(user_id, fallback_points, e),
        };

        let stored = match self
            .bounded("course history read", self.store.list_course_records(user_id))
            .await
        {
            Ok(stored) => stored,
            Err(e) => return abort_with_fallback(user_id, fallback_points, e),
        };

        // Repair a cache that lost a concurrent write; non-fatal if unavailable.
        let old_points = match self
            .bounded("ledger read", self.store.ledger_total(user_id))
            .await
        {
            Ok(ledger_points) if ledger_points > account.total_points => {
                tracing::info!(
                    user_id,
                    cached = account.total_points,
                    ledger = ledger_points,
                    "Cached points behind ledger, repairing"
                );
                ledger_points
            }
            Ok(_) => account.total_points,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Ledger total unavailable, using cached points");
                account.total_points
            }
        };
        let old_level = if old_points > account.total_points {
            level_for_points(old_points).max(account.level)
        } else {
            account.level.max(1)
        };

        // 2. Diff
        let delta = reconcile(canonical, &stored);
        let now = Utc::now();

        tracing::debug!(
            user_id,
            new_courses = delta.new_courses.len(),
            advanced_courses = delta.advanced_courses.len(),
            deactivate = delta.courses_to_deactivate.len(),
            points_delta = delta.points_delta,
            "Reconciled snapshot"
        );

        // 3. Ledger append (positive deltas only)
        if delta.has_points() {
            let entry = PointsLedgerEntry::new(user_id, delta.points_delta, delta.reason(), now);
            if let Err(e) = self
                .bounded("ledger append", self.store.append_ledger_entry(&entry))
                .await
            {
                tracing::error!(user_id, error = %e, "Ledger append failed, aborting sync");
                return SyncResult::unchanged(old_points, old_level, e.to_string());
            }
        }

        // 4. Level
        let final_points = old_points.saturating_add(delta.points_delta);
        let new_level = level_for_points(final_points);
        let leveled_up = new_level > old_level;

        // 5. Account projection (last write wins)
        let mut degraded: Option<String> = None;
        let updated_account = UserAccount {
            total_points: final_points,
            level: new_level,
            last_sync_at: Some(now),
            learner_id: account.learner_id.or(learner_id),
            ..account
        };
        if let Err(e) = self
            .bounded("account write", self.store.upsert_account(&updated_account))
            .await
        {
            // The ledger already holds the grant; keep going so course rows
            // advance and the grant is not recomputed next time.
            tracing::warn!(user_id, error = %e, "Account write failed, continuing");
            degraded = Some(e.to_string());
        }

        // 6. Course rows, merged over whatever the store holds now
        let stored_by_id: HashMap<u64, _> = stored.iter().map(|r| (r.course_id, r)).collect();
        let mut courses_created = 0u32;
        let mut courses_updated = 0u32;

        for upsert in &delta.course_upserts {
            let record = apply_upsert(
                user_id,
                stored_by_id.get(&upsert.course_id).copied(),
                upsert,
                now,
            );
            match self
                .bounded("course upsert", self.store.merge_course_record(&record))
                .await
            {
                Ok(()) if upsert.exists => courses_updated += 1,
                Ok(()) => courses_created += 1,
                Err(e) => tracing::warn!(
                    user_id,
                    course_id = upsert.course_id,
                    error = %e,
                    "Course upsert failed, skipping"
                ),
            }
        }

        for &course_id in &delta.courses_to_deactivate {
            match self
                .bounded(
                    "course deactivate",
                    self.store.deactivate_course(user_id, course_id, now),
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(user_id, course_id, "Course row missing, nothing to deactivate")
                }
                Err(e) => tracing::warn!(
                    user_id,
                    course_id,
                    error = %e,
                    "Course deactivation failed, skipping"
                ),
            }
        }

        // 7. Badges
        let ctx = BadgeContext {
            courses: canonical,
            raw_external_points: raw_points,
            level: new_level,
        };
        let badges_unlocked = self.unlock_badges(user_id, &ctx).await;

        tracing::info!(
            user_id,
            old_points,
            final_points,
            old_level,
            new_level,
            leveled_up,
            courses_created,
            courses_updated,
            badges_unlocked,
            "Progress sync complete"
        );

        // 8. Summary
        SyncResult {
            points: final_points,
            level: new_level,
            leveled_up,
            old_level,
            old_points,
            courses_created,
            courses_updated,
            badges_unlocked,
            error: degraded,
        }
    }

    /// Evaluate rules and persist new unlocks. Returns how many were created.
    async fn unlock_badges(&self, user_id: u64, ctx: &BadgeContext<'_>) -> u32 {
        let catalog = match self.bounded("badge catalog", self.store.list_badges()).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Badge catalog unavailable, skipping badges");
                return 0;
            }
        };
        let unlocked = match self
            .bounded("unlocked badges", self.store.list_unlocked_badge_ids(user_id))
            .await
        {
            Ok(unlocked) => unlocked,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Unlocked badges unavailable, skipping badges");
                return 0;
            }
        };

        let mut count = 0;
        for badge_id in badges::newly_unlocked(&catalog, &unlocked, ctx) {
            let unlock = UserBadgeUnlock {
                user_id,
                badge_id,
                unlocked_at: Utc::now(),
            };
            match self
                .bounded("badge unlock", self.store.unlock_badge(&unlock))
                .await
            {
                Ok(true) => {
                    tracing::info!(user_id, badge_id, "Badge unlocked");
                    count += 1;
                }
                Ok(false) => {
                    tracing::debug!(user_id, badge_id, "Badge already unlocked (idempotent skip)");
                }
                Err(e) => {
                    tracing::warn!(user_id, badge_id, error = %e, "Badge unlock failed, skipping")
                }
            }
        }
        count
    }

    /// Run `fut` with the configured timeout.
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout(self.settings.external_timeout, fut)
            .await
            .map_err(|_| AppError::Timeout(what.to_string()))?
    }
}

fn abort_with_fallback(user_id: u64, fallback_points: u64, err: AppError) -> SyncResult {
    tracing::error!(
        user_id,
        fallback_points,
        error = %err,
        "Baseline read failed, returning fallback state"
    );
    SyncResult::fallback(fallback_points, err.to_string())
}
