// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a sync timestamp for API responses (RFC3339, `Z` suffix).
///
/// `None` means the user has never synced.
pub fn format_sync_time(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_sync_time() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            format_sync_time(Some(date)).as_deref(),
            Some("2026-03-01T12:30:05Z")
        );
        assert_eq!(format_sync_time(None), None);
    }
}
