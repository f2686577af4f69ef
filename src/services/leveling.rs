// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Level curve.
//!
//! `level(points) = floor(sqrt(points / 100)) + 1`, so level `L` spans the
//! points range `[(L-1)² × 100, L² × 100)`.

use serde::Serialize;

/// Points per "unit" of the level curve.
const POINTS_SCALE: u64 = 100;

/// Level reached with `points` cumulative points. Always ≥ 1.
pub fn level_for_points(points: u64) -> u32 {
    let units = points / POINTS_SCALE;
    // floor(sqrt(p / 100)) == isqrt(floor(p / 100)); fix up float rounding.
    let mut root = (units as f64).sqrt() as u64;
    while root * root > units {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= units {
        root += 1;
    }
    u32::try_from(root + 1).unwrap_or(u32::MAX)
}

/// First point value belonging to `level`. Saturates at `u64::MAX`.
pub fn level_start(level: u32) -> u64 {
    let below = u64::from(level.max(1) - 1);
    below.saturating_mul(below).saturating_mul(POINTS_SCALE)
}

/// Points needed to cross `level` (width of its range).
pub fn xp_needed(level: u32) -> u64 {
    let level = level.max(1);
    level_start(level.saturating_add(1)).saturating_sub(level_start(level))
}

/// Percentage of `level`'s range covered by `points`, clamped to `[0, 100]`.
pub fn xp_progress_percent(points: u64, level: u32) -> f64 {
    let needed = xp_needed(level);
    if needed == 0 {
        // Range collapsed at the top of the scale.
        return 100.0;
    }
    let start = level_start(level) as f64;
    let percent = (points as f64 - start) / needed as f64 * 100.0;
    percent.clamp(0.0, 100.0)
}

/// XP range metadata for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct XpRange {
    pub level: u32,
    pub level_start: u64,
    pub next_level_start: u64,
    pub xp_needed: u64,
    pub progress_percent: f64,
}

impl XpRange {
    pub fn for_points(points: u64) -> Self {
        let level = level_for_points(points);
        Self {
            level,
            level_start: level_start(level),
            next_level_start: level_start(level.saturating_add(1)),
            xp_needed: xp_needed(level),
            progress_percent: xp_progress_percent(points, level),
        }
    }
}
