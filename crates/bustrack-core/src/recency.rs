//! Read-time recency classification of location fixes.
//!
//! Recency is derived from a fix's timestamp and the current time whenever
//! it is displayed; it is never stored on a vehicle.

use std::fmt;

use chrono::{DateTime, Utc};

/// Fixes younger than this are fresh.
pub const FRESH_LIMIT_SECS: i64 = 5 * 60;

/// Fixes younger than this (and not fresh) are stale.
pub const STALE_LIMIT_SECS: i64 = 15 * 60;

/// How recent a vehicle's last fix is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recency {
    /// Under five minutes old.
    Fresh,
    /// Five minutes up to (not including) fifteen.
    Stale,
    /// Fifteen minutes or older.
    Old,
    /// No timestamp to judge by.
    Unknown,
}

impl Recency {
    /// Classify a fix taken at `timestamp` as seen at `now`.
    ///
    /// Lower bounds are inclusive: exactly five minutes is stale, exactly
    /// fifteen is old. Timestamps in the future count as fresh.
    pub fn classify(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(at) = timestamp else {
            return Self::Unknown;
        };
        let age = now.signed_duration_since(at).num_seconds();
        if age < FRESH_LIMIT_SECS {
            Self::Fresh
        } else if age < STALE_LIMIT_SECS {
            Self::Stale
        } else {
            Self::Old
        }
    }

    /// Status dot colour.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Fresh => "#4CAF50",
            Self::Stale => "#FF9800",
            Self::Old => "#F44336",
            Self::Unknown => "#9E9E9E",
        }
    }

    /// Legend label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fresh => "Recent",
            Self::Stale => "Moderate",
            Self::Old => "Old",
            Self::Unknown => "No data",
        }
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Human-readable age of a fix, e.g. `"3m ago"`.
pub fn format_age(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = timestamp else {
        return "No data".to_owned();
    };
    let minutes = now.signed_duration_since(at).num_minutes();
    if minutes < 1 {
        return "Just now".to_owned();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn aged(secs: i64) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
        let now = Utc::now();
        (Some(now - Duration::seconds(secs)), now)
    }

    #[test]
    fn tier_boundaries() {
        let cases = [
            (4 * 60 + 59, Recency::Fresh),
            (5 * 60, Recency::Stale),
            (14 * 60 + 59, Recency::Stale),
            (15 * 60, Recency::Old),
            (3 * 3600, Recency::Old),
        ];
        for (secs, expected) in cases {
            let (at, now) = aged(secs);
            assert_eq!(Recency::classify(at, now), expected, "age {secs}s");
        }
    }

    #[test]
    fn sub_second_age_below_boundary_is_fresh() {
        let now = Utc::now();
        let at = now - Duration::milliseconds(5 * 60 * 1000 - 1);
        assert_eq!(Recency::classify(Some(at), now), Recency::Fresh);
    }

    #[test]
    fn missing_timestamp_is_unknown_not_old() {
        let unknown = Recency::classify(None, Utc::now());
        assert_eq!(unknown, Recency::Unknown);
        assert_ne!(unknown.color(), Recency::Old.color());
    }

    #[test]
    fn future_timestamp_is_fresh() {
        let (at, now) = aged(-120);
        assert_eq!(Recency::classify(at, now), Recency::Fresh);
    }

    #[test]
    fn age_formatting() {
        let cases = [
            (30, "Just now"),
            (60, "1m ago"),
            (59 * 60, "59m ago"),
            (2 * 3600 + 5, "2h ago"),
            (3 * 86_400, "3d ago"),
        ];
        for (secs, expected) in cases {
            let (at, now) = aged(secs);
            assert_eq!(format_age(at, now), expected);
        }
        assert_eq!(format_age(None, Utc::now()), "No data");
    }
}
