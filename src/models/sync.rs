// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync result handed back to callers and to the progress display.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::services::leveling;

/// Outcome of one reconciliation run.
///
/// When `error` is set the sync was aborted or partially failed and the
/// point/level fields carry the best-known prior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResult {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub points: u64,
    pub level: u32,
    pub leveled_up: bool,
    pub old_level: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub old_points: u64,
    pub courses_created: u32,
    pub courses_updated: u32,
    pub badges_unlocked: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    /// Stale-but-valid state: `points` recomputed into a level, nothing changed.
    pub fn fallback(points: u64, error: impl Into<String>) -> Self {
        let level = leveling::level_for_points(points);
        Self::unchanged(points, level, error)
    }

    /// Prior state as read from the account, nothing changed.
    pub fn unchanged(points: u64, level: u32, error: impl Into<String>) -> Self {
        Self {
            points,
            level,
            leveled_up: false,
            old_level: level,
            old_points: points,
            courses_created: 0,
            courses_updated: 0,
            badges_unlocked: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
