// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local development and tests.
//!
//! Mirrors the Firestore document layout (one entry per document ID) and can
//! inject failures or latency per operation to exercise degraded syncs.

use crate::db::ProgressStore;
use crate::error::AppError;
use crate::models::course::course_doc_id;
use crate::models::{Badge, PointsLedgerEntry, StoredCourseRecord, UserAccount, UserBadgeUnlock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetAccount,
    UpsertAccount,
    ListCourses,
    UpsertCourse,
    AppendLedger,
    ListLedger,
    ListBadges,
    ListUnlocks,
    UnlockBadge,
}

#[derive(Default)]
struct Inner {
    accounts: DashMap<u64, UserAccount>,
    courses: DashMap<String, StoredCourseRecord>,
    ledger: DashMap<String, PointsLedgerEntry>,
    badges: DashMap<u64, Badge>,
    unlocks: DashMap<String, UserBadgeUnlock>,

    failing_ops: DashSet<StoreOp>,
    failing_courses: DashSet<u64>,
    failing_badges: DashSet<u64>,
    latency: Mutex<Option<Duration>>,
}

/// DashMap-backed [`ProgressStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail.
    pub fn fail_on(&self, op: StoreOp) {
        self.inner.failing_ops.insert(op);
    }

    /// Make upserts of one course fail.
    pub fn fail_course(&self, course_id: u64) {
        self.inner.failing_courses.insert(course_id);
    }

    /// Make unlocks of one badge fail.
    pub fn fail_badge(&self, badge_id: u64) {
        self.inner.failing_badges.insert(badge_id);
    }

    pub fn clear_failures(&self) {
        self.inner.failing_ops.clear();
        self.inner.failing_courses.clear();
        self.inner.failing_badges.clear();
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.inner.latency.lock() {
            *guard = latency;
        }
    }

    /// Number of ledger entries across all users.
    pub fn ledger_len(&self) -> usize {
        self.inner.ledger.len()
    }

    async fn enter(&self, op: StoreOp) -> Result<(), AppError> {
        let latency = self.inner.latency.lock().ok().and_then(|g| *g);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.inner.failing_ops.contains(&op) {
            return Err(AppError::Database(format!("Injected failure: {:?}", op)));
        }
        Ok(())
    }

    fn check_course(&self, course_id: u64) -> Result<(), AppError> {
        if self.inner.failing_courses.contains(&course_id) {
            return Err(AppError::Database(format!(
                "Injected failure for course {}",
                course_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_account(&self, user_id: u64) -> Result<Option<UserAccount>, AppError> {
        self.enter(StoreOp::GetAccount).await?;
        Ok(self.inner.accounts.get(&user_id).map(|a| a.value().clone()))
    }

    async fn upsert_account(&self, account: &UserAccount) -> Result<(), AppError> {
        self.enter(StoreOp::UpsertAccount).await?;
        self.inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn list_course_records(
        &self,
        user_id: u64,
    ) -> Result<Vec<StoredCourseRecord>, AppError> {
        self.enter(StoreOp::ListCourses).await?;
        let mut records: Vec<StoredCourseRecord> = self
            .inner
            .courses
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.course_id);
        Ok(records)
    }

    async fn merge_course_record(&self, record: &StoredCourseRecord) -> Result<(), AppError> {
        self.enter(StoreOp::UpsertCourse).await?;
        self.check_course(record.course_id)?;
        match self.inner.courses.entry(record.doc_id()) {
            Entry::Occupied(mut slot) => {
                let merged = record.merged_over(Some(slot.get()));
                slot.insert(merged);
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
        Ok(())
    }

    async fn deactivate_course(
        &self,
        user_id: u64,
        course_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.enter(StoreOp::UpsertCourse).await?;
        self.check_course(course_id)?;
        match self.inner.courses.get_mut(&course_doc_id(user_id, course_id)) {
            Some(mut row) => {
                row.deactivate(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_ledger_entry(&self, entry: &PointsLedgerEntry) -> Result<(), AppError> {
        self.enter(StoreOp::AppendLedger).await?;
        // Same-nanosecond grants of equal size get a suffix rather than overwrite.
        let base = entry.doc_id();
        let mut doc_id = base.clone();
        for n in 1.. {
            match self.inner.ledger.entry(doc_id) {
                Entry::Vacant(slot) => {
                    slot.insert(entry.clone());
                    break;
                }
                Entry::Occupied(_) => doc_id = format!("{}_{}", base, n),
            }
        }
        Ok(())
    }

    async fn list_ledger_entries(&self, user_id: u64) -> Result<Vec<PointsLedgerEntry>, AppError> {
        self.enter(StoreOp::ListLedger).await?;
        let mut entries: Vec<PointsLedgerEntry> = self
            .inner
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, AppError> {
        self.enter(StoreOp::ListBadges).await?;
        let mut badges: Vec<Badge> = self.inner.badges.iter().map(|b| b.value().clone()).collect();
        badges.sort_by_key(|b| b.id);
        Ok(badges)
    }

    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError> {
        self.inner.badges.insert(badge.id, badge.clone());
        Ok(())
    }

    async fn list_unlocked_badge_ids(&self, user_id: u64) -> Result<HashSet<u64>, AppError> {
        self.enter(StoreOp::ListUnlocks).await?;
        Ok(self
            .inner
            .unlocks
            .iter()
            .filter(|u| u.user_id == user_id)
            .map(|u| u.badge_id)
            .collect())
    }

    async fn unlock_badge(&self, unlock: &UserBadgeUnlock) -> Result<bool, AppError> {
        self.enter(StoreOp::UnlockBadge).await?;
        if self.inner.failing_badges.contains(&unlock.badge_id) {
            return Err(AppError::Database(format!(
                "Injected failure for badge {}",
                unlock.badge_id
            )));
        }
        match self.inner.unlocks.entry(unlock.doc_id()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(unlock.clone());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(progress: u8) -> StoredCourseRecord {
        StoredCourseRecord {
            user_id: 1,
            course_id: 5,
            course_name: "Rust".to_string(),
            progress,
            is_active: true,
            last_synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_merge_keeps_higher_stored_progress() {
        let store = MemoryStore::new();
        store.merge_course_record(&row(60)).await.unwrap();
        store.merge_course_record(&row(20)).await.unwrap();

        let records = store.list_course_records(1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].progress, 60);
    }

    #[tokio::test]
    async fn test_deactivate_only_flips_active_flag() {
        let store = MemoryStore::new();
        assert!(!store.deactivate_course(1, 5, Utc::now()).await.unwrap());

        store.merge_course_record(&row(45)).await.unwrap();
        assert!(store.deactivate_course(1, 5, Utc::now()).await.unwrap());

        let records = store.list_course_records(1).await.unwrap();
        assert!(!records[0].is_active);
        assert_eq!(records[0].progress, 45);
    }

    #[tokio::test]
    async fn test_unlock_is_idempotent() {
        let store = MemoryStore::new();
        let unlock = UserBadgeUnlock {
            user_id: 1,
            badge_id: 2,
            unlocked_at: Utc::now(),
        };

        assert!(store.unlock_badge(&unlock).await.unwrap());
        assert!(!store.unlock_badge(&unlock).await.unwrap());
        assert_eq!(store.list_unlocked_badge_ids(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_total_includes_legacy_baseline() {
        let store = MemoryStore::new();
        let mut account = UserAccount::new(1);
        account.legacy_points = 40;
        store.upsert_account(&account).await.unwrap();

        let now = Utc::now();
        store
            .append_ledger_entry(&PointsLedgerEntry::new(1, 90, "a".into(), now))
            .await
            .unwrap();
        // Identical key: must not overwrite.
        store
            .append_ledger_entry(&PointsLedgerEntry::new(1, 90, "b".into(), now))
            .await
            .unwrap();

        assert_eq!(store.ledger_total(1).await.unwrap(), 40 + 180);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::GetAccount);
        assert!(matches!(
            store.get_account(1).await,
            Err(AppError::Database(_))
        ));

        store.clear_failures();
        assert!(store.get_account(1).await.unwrap().is_none());
    }
}
