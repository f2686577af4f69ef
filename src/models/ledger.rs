// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only points ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One positive point grant.
///
/// Stored at: `points_history/{user_id}_{created_at_nanos}_{points}`
///
/// Entries are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsLedgerEntry {
    pub user_id: u64,
    pub points: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl PointsLedgerEntry {
    pub fn new(user_id: u64, points: u64, reason: String, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            points,
            reason,
            created_at,
        }
    }

    /// Document ID; unique per grant so concurrent appends never collide.
    pub fn doc_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.user_id,
            self.created_at.timestamp_nanos_opt().unwrap_or_default(),
            self.points
        )
    }
}
