// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (cached points/level projection)
//! - Course progress (permanent per-course history)
//! - Points history (append-only ledger)
//! - Badges and user badges (catalog and permanent unlocks)
//!
//! Document IDs are derived from each collection's unique key, so upserts and
//! unlocks are idempotent under retries and concurrent duplicate syncs.
//! Course rows are merged inside a transaction so progress never goes down,
//! and ledger entries are created, never overwritten.

use crate::db::{collections, ProgressStore};
use crate::error::AppError;
use crate::models::course::course_doc_id;
use crate::models::{Badge, PointsLedgerEntry, StoredCourseRecord, UserAccount, UserBadgeUnlock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Attempts at a collision-free ledger document ID.
const LEDGER_INSERT_ATTEMPTS: u32 = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Read one course history row by document ID.
    async fn get_course_row(&self, doc_id: &str) -> Result<Option<StoredCourseRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COURSE_PROGRESS)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl ProgressStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_account(&self, user_id: u64) -> Result<Option<UserAccount>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_account(&self, account: &UserAccount) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(account.id.to_string())
            .object(account)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Course Progress Operations ──────────────────────────────

    async fn list_course_records(
        &self,
        user_id: u64,
    ) -> Result<Vec<StoredCourseRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COURSE_PROGRESS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn merge_course_record(&self, record: &StoredCourseRecord) -> Result<(), AppError> {
        let doc_id = record.doc_id();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read the current row so a concurrent higher write is never undone.
        let current = self.get_course_row(&doc_id).await?;
        let merged = record.merged_over(current.as_ref());

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::COURSE_PROGRESS)
            .document_id(&doc_id)
            .object(&merged)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add course row to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    async fn deactivate_course(
        &self,
        user_id: u64,
        course_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let doc_id = course_doc_id(user_id, course_id);

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let Some(mut row) = self.get_course_row(&doc_id).await? else {
            let _ = transaction.rollback().await;
            return Ok(false);
        };
        row.deactivate(at);

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::COURSE_PROGRESS)
            .document_id(&doc_id)
            .object(&row)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add course row to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(true)
    }

    // ─── Points Ledger Operations ────────────────────────────────

    async fn append_ledger_entry(&self, entry: &PointsLedgerEntry) -> Result<(), AppError> {
        let base = entry.doc_id();
        let mut doc_id = base.clone();

        // Create-only; a same-nanosecond collision retries under a suffixed ID.
        for attempt in 1..=LEDGER_INSERT_ATTEMPTS {
            let result: Result<PointsLedgerEntry, _> = self
                .get_client()?
                .fluent()
                .insert()
                .into(collections::POINTS_HISTORY)
                .document_id(&doc_id)
                .object(entry)
                .execute()
                .await;

            match result {
                Ok(_) => return Ok(()),
                Err(firestore::errors::FirestoreError::DataConflictError(_)) => {
                    tracing::debug!(doc_id = %doc_id, "Ledger document exists, retrying with suffix");
                    doc_id = format!("{}_{}", base, attempt);
                }
                Err(e) => return Err(AppError::Database(e.to_string())),
            }
        }

        Err(AppError::Database(format!(
            "Ledger entry {} collided {} times",
            base, LEDGER_INSERT_ATTEMPTS
        )))
    }

    async fn list_ledger_entries(&self, user_id: u64) -> Result<Vec<PointsLedgerEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::POINTS_HISTORY)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Badge Operations ────────────────────────────────────────

    async fn list_badges(&self) -> Result<Vec<Badge>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BADGES)
            .order_by([("id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_badge(&self, badge: &Badge) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BADGES)
            .document_id(badge.id.to_string())
            .object(badge)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_unlocked_badge_ids(&self, user_id: u64) -> Result<HashSet<u64>, AppError> {
        let unlocks: Vec<UserBadgeUnlock> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USER_BADGES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(unlocks.into_iter().map(|u| u.badge_id).collect())
    }

    async fn unlock_badge(&self, unlock: &UserBadgeUnlock) -> Result<bool, AppError> {
        let doc_id = unlock.doc_id();

        let existing: Option<UserBadgeUnlock> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_BADGES)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if existing.is_some() {
            return Ok(false);
        }

        // A concurrent duplicate write lands on the same document.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_BADGES)
            .document_id(&doc_id)
            .object(unlock)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(true)
    }
}
