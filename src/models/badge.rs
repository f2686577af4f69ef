// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Badge catalog and per-user unlocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Catalog badge (reference data, never mutated by a sync).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: u64,
    /// Unique symbolic key, also the unlock rule reference (e.g. "LEVEL_5")
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub rarity: String,
    /// Threshold for badges without a dedicated rule
    #[serde(default)]
    pub points_required: Option<u64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A permanent unlock.
///
/// Stored at: `user_badges/{user_id}_{badge_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadgeUnlock {
    pub user_id: u64,
    pub badge_id: u64,
    pub unlocked_at: DateTime<Utc>,
}

impl UserBadgeUnlock {
    pub fn doc_id(&self) -> String {
        unlock_doc_id(self.user_id, self.badge_id)
    }
}

/// Document ID of the `(user, badge)` unlock; one per pair.
pub fn unlock_doc_id(user_id: u64, badge_id: u64) -> String {
    format!("{}_{}", user_id, badge_id)
}

/// Catalog entry annotated with the user's unlock status, for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BadgeStatus {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub rarity: String,
    /// Retired badges stay listed so past unlocks remain visible.
    pub is_active: bool,
    pub unlocked: bool,
}

impl BadgeStatus {
    pub fn from_badge(badge: Badge, unlocked: bool) -> Self {
        Self {
            id: badge.id,
            code: badge.code,
            name: badge.name,
            description: badge.description,
            category: badge.category,
            rarity: badge.rarity,
            is_active: badge.is_active,
            unlocked,
        }
    }
}
