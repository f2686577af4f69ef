// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account stored in Firestore.
///
/// `total_points` and `level` are a cached projection of the ledger and are
/// overwritten on every sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Internal user ID (also used as document ID)
    pub id: u64,
    /// Learning platform learner ID, if linked
    #[serde(default)]
    pub learner_id: Option<u64>,
    #[serde(default)]
    pub total_points: u64,
    #[serde(default = "default_level")]
    pub level: u32,
    /// Points granted before the ledger existed
    #[serde(default)]
    pub legacy_points: u64,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

fn default_level() -> u32 {
    1
}

impl UserAccount {
    /// A fresh account: no points, level 1.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            learner_id: None,
            total_points: 0,
            level: 1,
            legacy_points: 0,
            last_sync_at: None,
        }
    }
}
