// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Overlapping syncs for the same user (e.g. two browser tabs).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use xp_sync::db::{MemoryStore, ProgressStore};
use xp_sync::error::AppError;
use xp_sync::models::{Badge, PointsLedgerEntry, StoredCourseRecord, UserAccount, UserBadgeUnlock};
use xp_sync::services::{SyncService, SyncSettings};

mod common;
use common::{course, seeded_store, test_service, StaticCourseSource};

const NUM_CONCURRENT_SYNCS: usize = 10;
const STORE_LATENCY: Duration = Duration::from_millis(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_user_lock_grants_points_once() {
    let store = seeded_store().await;
    store.set_latency(Some(STORE_LATENCY));
    let service = test_service(store.clone(), Arc::new(StaticCourseSource::new(json!([]))), true);
    let user_id = 7;

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_SYNCS {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.sync_snapshot(user_id, vec![course(1, 60)], None).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        let result = handle.await.expect("Task join failed");
        assert!(result.error.is_none());
        assert_eq!(result.points, 180);
        if result.old_points == 0 {
            granted += 1;
        }
    }
    assert_eq!(granted, 1, "exactly one sync sees the course as new");

    store.set_latency(None);
    assert_eq!(store.list_ledger_entries(user_id).await.unwrap().len(), 1);
    let account = store.get_account(user_id).await.unwrap().unwrap();
    assert_eq!(account.total_points, store.ledger_total(user_id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unlocked_overlap_heals_on_next_sync() {
    let store = seeded_store().await;
    store.set_latency(Some(STORE_LATENCY));
    let service = test_service(store.clone(), Arc::new(StaticCourseSource::new(json!([]))), false);
    let user_id = 8;

    let mut handles = vec![];
    for i in 0..NUM_CONCURRENT_SYNCS {
        let service = service.clone();
        let percent = 10 + i as u8 * 5;
        handles.push(tokio::spawn(async move {
            service
                .sync_snapshot(user_id, vec![course(1, percent)], None)
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.expect("Task join failed").error.is_none());
    }

    store.set_latency(None);

    let records = store.list_course_records(user_id).await.unwrap();
    assert_eq!(records.len(), 1);
    // Row writes merge, so the highest reported value wins.
    assert_eq!(records[0].progress, 55);

    // The cached total may lag the ledger, but never leads it.
    let ledger = store.ledger_total(user_id).await.unwrap();
    let cached = store.get_account(user_id).await.unwrap().unwrap().total_points;
    assert!(cached <= ledger);

    // A quiet sync brings the cache back in line with the ledger.
    let result = service
        .sync_snapshot(user_id, vec![course(1, 55)], None)
        .await;
    let ledger = store.ledger_total(user_id).await.unwrap();
    assert_eq!(result.points, ledger);
    assert_eq!(
        store.get_account(user_id).await.unwrap().unwrap().total_points,
        ledger
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_users_sync_independently() {
    let store = seeded_store().await;
    store.set_latency(Some(Duration::from_millis(1)));
    let service = test_service(store.clone(), Arc::new(StaticCourseSource::new(json!([]))), true);

    let mut handles = vec![];
    for user_id in 1..=5u64 {
        for step in 1..=4u8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .sync_snapshot(user_id, vec![course(1, step * 20)], None)
                    .await
            }));
        }
    }
    for handle in handles {
        assert!(handle.await.expect("Task join failed").error.is_none());
    }

    store.set_latency(None);
    for user_id in 1..=5u64 {
        let account = store.get_account(user_id).await.unwrap().unwrap();
        assert_eq!(account.total_points, store.ledger_total(user_id).await.unwrap());
        assert_eq!(account.total_points, 240);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STALE COURSE WRITES
// ═══════════════════════════════════════════════════════════════════════════

const SLOW_WRITE: Duration = Duration::from_millis(100);

/// Store whose course writes below `slow_below` percent, and all
/// deactivations, land late. Everything else goes straight through.
struct SlowCourseWrites {
    inner: MemoryStore,
    slow_below: u8,
}

#[async_trait]
impl ProgressStore for SlowCourseWrites {
    async fn get_account(&self, user_id: u64) -> Result<Option<UserAccount>, AppError> {
        self.inner.get_account(user_id).await
    }
    async fn upsert_account(&self, account: &UserAccount) -> Result<(), AppError> {
        self.inner.upsert_account(account).await
    }
    async fn list_course_records(
        &self,
        user_id: u64,
    ) -> Result<Vec<StoredCourseRecord>, AppError> {
        self.inner.list_course_records(user_id).await
    }
    async fn merge_course_record(&self, record: &StoredCourseRecord) -> Result<(), AppError> {
        if record.progress < self.slow_below {
            tokio::time::sleep(SLOW_WRITE).await;
        }
        self.inner.merge_course_record(record).await
    }
    async fn deactivate_course(
        &self,
        user_id: u64,
        course_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        tokio::time::sleep(SLOW_WRITE).await;
        self.inner.deactivate_course(user_id, course_id, at).await
    }
    async fn append_ledger_entry(&self, entry: &PointsLedgerEntry) -> Result<(), AppError> {
        self.inner.append_ledger_entry(entry).await
    }
    async fn list_ledger_entries(
        &self,
        user_id: u64,
    ) -> Result<Vec<PointsLedgerEntry>, AppError> {
        self.inner.list_ledger_entries(user_id).await
    }
    async fn list_badges(&self) -> Result<Vec<Badge>, AppError> {
        self.inner.list_badges().await
    }
    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError> {
        self.inner.upsert_badge(badge).await
    }
    async fn list_unlocked_badge_ids(&self, user_id: u64) -> Result<HashSet<u64>, AppError> {
        self.inner.list_unlocked_badge_ids(user_id).await
    }
    async fn unlock_badge(&self, unlock: &UserBadgeUnlock) -> Result<bool, AppError> {
        self.inner.unlock_badge(unlock).await
    }
}

/// Unserialized service over a store with slow low-progress writes, plus a
/// stored row for course 1 at 20%.
async fn slow_write_service(user_id: u64) -> (SyncService, MemoryStore) {
    let store = seeded_store().await;
    let source = Arc::new(StaticCourseSource::new(json!([])));
    let baseline = test_service(store.clone(), source.clone(), true)
        .sync_snapshot(user_id, vec![course(1, 20)], None)
        .await;
    assert_eq!(baseline.points, 60);

    let service = SyncService::new(
        Arc::new(SlowCourseWrites {
            inner: store.clone(),
            slow_below: 50,
        }),
        source,
        SyncSettings {
            external_timeout: Duration::from_secs(2),
            serialize_per_user: false,
        },
    );
    (service, store)
}

/// Start `first`, then `second` once `first` has read its baseline.
async fn overlap(service: &SyncService, user_id: u64, first: Vec<u8>, second: Vec<u8>) {
    let stale = {
        let service = service.clone();
        let courses: Vec<_> = first.into_iter().map(|p| course(1, p)).collect();
        tokio::spawn(async move { service.sync_snapshot(user_id, courses, None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let fresh = service
        .sync_snapshot(user_id, second.into_iter().map(|p| course(1, p)).collect(), None)
        .await;

    assert!(fresh.error.is_none());
    assert!(stale.await.expect("Task join failed").error.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stale_course_write_does_not_lower_progress() {
    let user_id = 21;
    let (service, store) = slow_write_service(user_id).await;

    // The 20% sync read the row before the 60% sync raised it, and writes last.
    overlap(&service, user_id, vec![20], vec![60]).await;

    let records = store.list_course_records(user_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].progress, 60, "stored progress regressed");

    // The 60% is not paid out a second time.
    let next = service
        .sync_snapshot(user_id, vec![course(1, 60)], None)
        .await;
    assert_eq!(next.old_points, 180);
    assert_eq!(next.points, 180);
    assert_eq!(store.ledger_total(user_id).await.unwrap(), 180);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stale_deactivation_keeps_fresh_progress() {
    let user_id = 22;
    let (service, store) = slow_write_service(user_id).await;

    // An empty snapshot deactivates course 1 after the 60% sync raised it.
    overlap(&service, user_id, vec![], vec![60]).await;

    let records = store.list_course_records(user_id).await.unwrap();
    assert!(!records[0].is_active);
    assert_eq!(records[0].progress, 60);

    let next = service
        .sync_snapshot(user_id, vec![course(1, 60)], None)
        .await;
    assert_eq!(next.points, 180);
    assert_eq!(next.courses_updated, 1);
    let records = store.list_course_records(user_id).await.unwrap();
    assert!(records[0].is_active);
    assert_eq!(store.ledger_total(user_id).await.unwrap(), 180);
}
