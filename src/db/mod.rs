// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`ProgressStore`] is the seam between the sync engine and storage. It
//! only promises single-document atomicity; nothing here is transactional
//! across documents.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::{MemoryStore, StoreOp};

use crate::error::AppError;
use crate::models::{Badge, PointsLedgerEntry, StoredCourseRecord, UserAccount, UserBadgeUnlock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::collections::HashSet;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Per-(user, course) progress history
    pub const COURSE_PROGRESS: &str = "course_progress";
    /// Append-only points ledger
    pub const POINTS_HISTORY: &str = "points_history";
    pub const BADGES: &str = "badges";
    pub const USER_BADGES: &str = "user_badges";
}

/// Persistent-store primitives used by the sync engine.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    // ─── Accounts ────────────────────────────────────────────────
    async fn get_account(&self, user_id: u64) -> Result<Option<UserAccount>, AppError>;
    async fn upsert_account(&self, account: &UserAccount) -> Result<(), AppError>;

    // ─── Course History ──────────────────────────────────────────
    /// All rows for a user, active and inactive.
    async fn list_course_records(&self, user_id: u64)
        -> Result<Vec<StoredCourseRecord>, AppError>;
    /// Write `record` over the current row in one atomic read-modify-write.
    /// Stored progress never goes down.
    async fn merge_course_record(&self, record: &StoredCourseRecord) -> Result<(), AppError>;
    /// Flip an existing row to inactive without touching its progress.
    /// Returns `false` if the row does not exist.
    async fn deactivate_course(
        &self,
        user_id: u64,
        course_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    // ─── Points Ledger ───────────────────────────────────────────
    /// Create-only: an existing entry is never overwritten.
    async fn append_ledger_entry(&self, entry: &PointsLedgerEntry) -> Result<(), AppError>;
    async fn list_ledger_entries(&self, user_id: u64)
        -> Result<Vec<PointsLedgerEntry>, AppError>;

    // ─── Badges ──────────────────────────────────────────────────
    /// Full catalog ordered by badge ID.
    async fn list_badges(&self) -> Result<Vec<Badge>, AppError>;
    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError>;
    async fn list_unlocked_badge_ids(&self, user_id: u64) -> Result<HashSet<u64>, AppError>;
    /// Create the unlock if absent. Returns `false` if it already existed.
    async fn unlock_badge(&self, unlock: &UserBadgeUnlock) -> Result<bool, AppError>;

    /// Cumulative points from the source of truth: legacy baseline plus the
    /// sum of all ledger entries.
    async fn ledger_total(&self, user_id: u64) -> Result<u64, AppError> {
        let baseline = self
            .get_account(user_id)
            .await?
            .map(|a| a.legacy_points)
            .unwrap_or(0);
        let entries = self.list_ledger_entries(user_id).await?;
        Ok(entries
            .iter()
            .fold(baseline, |total, e| total.saturating_add(e.points)))
    }
}

/// Write `badges` into the catalog if it is empty. Returns how many were written.
///
/// Uses concurrent writes with a limit to avoid overloading the store.
pub async fn seed_catalog_if_empty(
    store: &dyn ProgressStore,
    badges: Vec<Badge>,
) -> Result<usize, AppError> {
    if !store.list_badges().await?.is_empty() {
        return Ok(0);
    }

    let count = badges.len();
    stream::iter(badges)
        .map(|badge| async move { store.upsert_badge(&badge).await })
        .buffer_unordered(MAX_CONCURRENT_DB_OPS)
        .collect::<Vec<Result<(), AppError>>>()
        .await
        .into_iter()
        .collect::<Result<Vec<()>, AppError>>()?;

    tracing::info!(count, "Badge catalog seeded");
    Ok(count)
}
