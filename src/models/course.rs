// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course progress models: the external feed, the canonical snapshot and
//! the persisted per-course history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Course record as returned by the learning platform.
///
/// Every field is optional because the feed is not trusted to be complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCourse {
    pub id: Option<u64>,
    pub shortname: Option<String>,
    pub fullname: Option<String>,
    /// Completion percentage; may be fractional, `null` or absent.
    pub progress: Option<f64>,
}

/// Canonical course progress for one sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CourseProgress {
    /// External (learning platform) course ID
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub course_id: u64,
    pub name: String,
    /// Completion percentage, always within 0..=100
    pub percent: u8,
}

impl CourseProgress {
    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }
}

/// Persisted course history row.
///
/// Stored at: `course_progress/{user_id}_{course_id}`
///
/// `progress` never decreases and rows are never deleted; a course that
/// disappears from the feed is only marked inactive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCourseRecord {
    pub user_id: u64,
    pub course_id: u64,
    pub course_name: String,
    pub progress: u8,
    pub is_active: bool,
    pub last_synced_at: DateTime<Utc>,
}

impl StoredCourseRecord {
    /// Firestore document ID for this row.
    pub fn doc_id(&self) -> String {
        course_doc_id(self.user_id, self.course_id)
    }

    /// This row written over `current`: progress is the max of both.
    pub fn merged_over(&self, current: Option<&StoredCourseRecord>) -> StoredCourseRecord {
        let mut merged = self.clone();
        if let Some(current) = current {
            merged.progress = merged.progress.max(current.progress);
        }
        merged
    }

    /// Mark inactive, leaving progress untouched.
    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        self.is_active = false;
        self.last_synced_at = at;
    }
}

/// Document ID of the `(user, course)` history row.
pub fn course_doc_id(user_id: u64, course_id: u64) -> String {
    format!("{}_{}", user_id, course_id)
}
