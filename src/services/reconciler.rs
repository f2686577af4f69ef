// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diffs a canonical snapshot against stored course history.
//!
//! The result is a monotonic delta: points are only ever granted for
//! progress that has not been seen before, and persisted progress never
//! goes down even when the platform reports a lower value (for example after
//! a re-enrollment reset).

use crate::models::{CourseProgress, StoredCourseRecord};
use crate::services::normalizer::POINTS_PER_PERCENT;
use std::collections::{HashMap, HashSet};

/// A course whose progress went up since the last sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedCourse {
    pub course: CourseProgress,
    pub previous_percent: u8,
}

/// Value to persist for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseUpsert {
    pub course_id: u64,
    pub name: String,
    /// `max(stored, canonical)`
    pub progress: u8,
    /// Whether a stored row already exists (update) or must be created.
    pub exists: bool,
}

/// Everything a sync needs to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDelta {
    pub new_courses: Vec<CourseProgress>,
    pub advanced_courses: Vec<AdvancedCourse>,
    pub points_delta: u64,
    pub course_upserts: Vec<CourseUpsert>,
    /// Active stored courses missing from the snapshot
    pub courses_to_deactivate: Vec<u64>,
}

impl LedgerDelta {
    /// Ledger reason text for this delta.
    pub fn reason(&self) -> String {
        format!(
            "Course progress: {} new, {} advanced",
            self.new_courses.len(),
            self.advanced_courses.len()
        )
    }

    /// Whether a ledger entry must be appended.
    pub fn has_points(&self) -> bool {
        self.points_delta > 0
    }
}

/// Reconcile `canonical` against all of a user's stored rows (active and inactive).
pub fn reconcile(canonical: &[CourseProgress], stored: &[StoredCourseRecord]) -> LedgerDelta {
    let stored_by_id: HashMap<u64, &StoredCourseRecord> =
        stored.iter().map(|r| (r.course_id, r)).collect();

    let mut delta = LedgerDelta::default();

    for course in canonical {
        match stored_by_id.get(&course.course_id) {
            None => {
                delta.points_delta += points_for(course.percent);
                delta.new_courses.push(course.clone());
                delta.course_upserts.push(CourseUpsert {
                    course_id: course.course_id,
                    name: course.name.clone(),
                    progress: course.percent,
                    exists: false,
                });
            }
            Some(record) => {
                if course.percent > record.progress {
                    delta.points_delta += points_for(course.percent - record.progress);
                    delta.advanced_courses.push(AdvancedCourse {
                        course: course.clone(),
                        previous_percent: record.progress,
                    });
                }
                delta.course_upserts.push(CourseUpsert {
                    course_id: course.course_id,
                    name: course.name.clone(),
                    progress: record.progress.max(course.percent),
                    exists: true,
                });
            }
        }
    }

    let present: HashSet<u64> = canonical.iter().map(|c| c.course_id).collect();
    delta.courses_to_deactivate = stored
        .iter()
        .filter(|r| r.is_active && !present.contains(&r.course_id))
        .map(|r| r.course_id)
        .collect();

    delta
}

fn points_for(percent: u8) -> u64 {
    u64::from(percent) * POINTS_PER_PERCENT
}

/// Apply an upsert to an existing row (or build a new one).
///
/// The store merges the result over the row it holds at write time, so a
/// stale `existing` cannot lower progress that advanced in the meantime.
pub fn apply_upsert(
    user_id: u64,
    existing: Option<&StoredCourseRecord>,
    upsert: &CourseUpsert,
    now: chrono::DateTime<chrono::Utc>,
) -> StoredCourseRecord {
    let progress = existing
        .map(|r| r.progress.max(upsert.progress))
        .unwrap_or(upsert.progress);

    StoredCourseRecord {
        user_id,
        course_id: upsert.course_id,
        course_name: upsert.name.clone(),
        progress,
        is_active: true,
        last_synced_at: now,
    }
}
