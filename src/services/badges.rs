// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Badge unlock rules.
//!
//! Each catalog badge's `code` resolves to one predicate. Resolution order:
//!
//! 1. always-true (`FIRST_LOGIN`)
//! 2. any course at or above a progress threshold (`PROGRESS_25/50/75/100`)
//! 3. completed-course count (`FIRST_COURSE`, `THREE_COURSES`, `FIVE_COURSES`)
//! 4. level threshold (`LEVEL_5`, `LEVEL_10`)
//! 5. fallback: the badge's `points_required` against the platform's raw
//!    point total for this snapshot
//!
//! NOTE: rule 5 deliberately uses the instantaneous external total rather
//! than the reconciled ledger total. Kept as observed in production; see
//! DESIGN.md before changing it.

use crate::models::{Badge, CourseProgress};
use std::collections::HashSet;

/// Resolved unlock predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockRule {
    Always,
    AnyCourseAtLeast(u8),
    CompletedCourses(usize),
    LevelAtLeast(u32),
    ExternalPointsAtLeast(u64),
    /// Unknown code without a usable threshold.
    Never,
}

impl UnlockRule {
    /// Resolve a badge's rule from its code and threshold.
    pub fn for_badge(badge: &Badge) -> Self {
        match badge.code.as_str() {
            "FIRST_LOGIN" => UnlockRule::Always,
            "PROGRESS_25" => UnlockRule::AnyCourseAtLeast(25),
            "PROGRESS_50" => UnlockRule::AnyCourseAtLeast(50),
            "PROGRESS_75" => UnlockRule::AnyCourseAtLeast(75),
            "PROGRESS_100" => UnlockRule::AnyCourseAtLeast(100),
            "FIRST_COURSE" => UnlockRule::CompletedCourses(1),
            "THREE_COURSES" => UnlockRule::CompletedCourses(3),
            "FIVE_COURSES" => UnlockRule::CompletedCourses(5),
            "LEVEL_5" => UnlockRule::LevelAtLeast(5),
            "LEVEL_10" => UnlockRule::LevelAtLeast(10),
            _ => match badge.points_required {
                Some(points) if points > 0 => UnlockRule::ExternalPointsAtLeast(points),
                _ => UnlockRule::Never,
            },
        }
    }

    pub fn is_satisfied(&self, ctx: &BadgeContext<'_>) -> bool {
        match *self {
            UnlockRule::Always => true,
            UnlockRule::AnyCourseAtLeast(threshold) => {
                ctx.courses.iter().any(|c| c.percent >= threshold)
            }
            UnlockRule::CompletedCourses(count) => {
                ctx.courses.iter().filter(|c| c.is_complete()).count() >= count
            }
            UnlockRule::LevelAtLeast(level) => ctx.level >= level,
            UnlockRule::ExternalPointsAtLeast(points) => ctx.raw_external_points >= points,
            UnlockRule::Never => false,
        }
    }
}

/// Post-sync state the rules are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct BadgeContext<'a> {
    pub courses: &'a [CourseProgress],
    /// Platform-reported point total for this snapshot, not the reconciled
    /// cumulative total
    pub raw_external_points: u64,
    pub level: u32,
}

/// Badge IDs to newly unlock.
///
/// Badges already in `unlocked` are skipped without evaluation, as are
/// inactive catalog entries. Output follows catalog order.
pub fn newly_unlocked(
    catalog: &[Badge],
    unlocked: &HashSet<u64>,
    ctx: &BadgeContext<'_>,
) -> Vec<u64> {
    catalog
        .iter()
        .filter(|b| b.is_active && !unlocked.contains(&b.id))
        .filter(|b| {
            let rule = UnlockRule::for_badge(b);
            let satisfied = rule.is_satisfied(ctx);
            if satisfied {
                tracing::debug!(badge_id = b.id, code = %b.code, ?rule, "Badge rule satisfied");
            }
            satisfied
        })
        .map(|b| b.id)
        .collect()
}

/// Built-in catalog, seeded into empty stores.
pub fn default_catalog() -> Vec<Badge> {
    const ENTRIES: &[(u64, &str, &str, &str, &str, &str, Option<u64>)] = &[
        (1, "FIRST_LOGIN", "Welcome", "Run your first sync", "milestone", "common", None),
        (2, "PROGRESS_25", "Getting Started", "Reach 25% in any course", "progress", "common", None),
        (3, "PROGRESS_50", "Halfway There", "Reach 50% in any course", "progress", "common", None),
        (4, "PROGRESS_75", "Almost Done", "Reach 75% in any course", "progress", "rare", None),
        (5, "PROGRESS_100", "Finisher", "Reach 100% in any course", "progress", "rare", None),
        (6, "FIRST_COURSE", "First Course", "Complete one course", "completion", "rare", None),
        (7, "THREE_COURSES", "Committed", "Complete three courses", "completion", "epic", None),
        (8, "FIVE_COURSES", "Scholar", "Complete five courses", "completion", "legendary", None),
        (9, "LEVEL_5", "Level 5", "Reach level 5", "level", "epic", None),
        (10, "LEVEL_10", "Level 10", "Reach level 10", "level", "legendary", None),
        (11, "POINTS_500", "Point Collector", "Hold 500 points on the platform", "points", "rare", Some(500)),
    ];

    ENTRIES
        .iter()
        .map(
            |&(id, code, name, description, category, rarity, points_required)| Badge {
                id,
                code: code.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                category: category.to_string(),
                rarity: rarity.to_string(),
                points_required,
                is_active: true,
            },
        )
        .collect()
}
