// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Converts the learning platform's course payload into a canonical snapshot.

use crate::models::{CourseProgress, RawCourse};
use serde_json::Value;
use std::collections::HashMap;

/// Points earned per percent of course progress.
pub const POINTS_PER_PERCENT: u64 = 3;

/// Normalize a raw JSON payload.
///
/// Anything other than a JSON array is treated as "no courses". Entries
/// that are not objects or lack a numeric `id` are dropped.
pub fn normalize_payload(payload: &Value) -> Vec<CourseProgress> {
    let Some(items) = payload.as_array() else {
        tracing::warn!(
            payload_kind = value_kind(payload),
            "Course payload is not a list, treating as empty"
        );
        return Vec::new();
    };

    let raw: Vec<RawCourse> = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<RawCourse>(item.clone()) {
            Ok(course) => Some(course),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed course entry");
                None
            }
        })
        .collect();

    normalize(raw)
}

/// Normalize typed course records.
///
/// Progress is floored and clamped to `0..=100`, missing progress counts as
/// 0, and duplicate IDs collapse to the highest reported percent.
pub fn normalize(raw: Vec<RawCourse>) -> Vec<CourseProgress> {
    let mut by_id: HashMap<u64, usize> = HashMap::new();
    let mut canonical: Vec<CourseProgress> = Vec::with_capacity(raw.len());

    for course in raw {
        let Some(course_id) = course.id else {
            continue;
        };
        let percent = clamp_percent(course.progress);
        let name = course
            .fullname
            .filter(|n| !n.is_empty())
            .or(course.shortname)
            .unwrap_or_default();

        match by_id.get(&course_id) {
            Some(&idx) => {
                let existing = &mut canonical[idx];
                if percent > existing.percent {
                    existing.percent = percent;
                }
            }
            None => {
                by_id.insert(course_id, canonical.len());
                canonical.push(CourseProgress {
                    course_id,
                    name,
                    percent,
                });
            }
        }
    }

    canonical
}

/// Instantaneous point total reported by the platform:
/// `Σ floor(percent × 3)` over the snapshot.
pub fn raw_external_points(courses: &[CourseProgress]) -> u64 {
    courses
        .iter()
        .map(|c| u64::from(c.percent) * POINTS_PER_PERCENT)
        .sum()
}

fn clamp_percent(progress: Option<f64>) -> u8 {
    match progress {
        Some(p) if p.is_finite() => p.floor().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
