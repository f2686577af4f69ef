// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod badge;
pub mod course;
pub mod ledger;
pub mod sync;
pub mod user;

pub use badge::{Badge, BadgeStatus, UserBadgeUnlock};
pub use course::{CourseProgress, RawCourse, StoredCourseRecord};
pub use ledger::PointsLedgerEntry;
pub use sync::SyncResult;
pub use user::UserAccount;
