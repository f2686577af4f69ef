// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod badges;
pub mod leveling;
pub mod moodle;
pub mod normalizer;
pub mod reconciler;
pub mod sync;

pub use badges::{default_catalog, BadgeContext, UnlockRule};
pub use leveling::{level_for_points, XpRange};
pub use moodle::{CourseSource, MoodleClient};
pub use reconciler::{reconcile, LedgerDelta};
pub use sync::{Snapshot, SyncRequest, SyncService, SyncSettings};
