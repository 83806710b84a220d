//! Log output for roster changes.

use bustrack_core::{ListRow, Recency};
use tracing::{debug, info};

/// Counts of list rows per recency tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterSummary {
    /// Rows in the list.
    pub total: usize,
    /// Fixes under five minutes old.
    pub fresh: usize,
    /// Fixes five to fifteen minutes old.
    pub stale: usize,
    /// Older fixes.
    pub old: usize,
    /// Buses with no fix.
    pub unknown: usize,
}

impl RosterSummary {
    /// Tally `rows` by recency.
    pub fn of(rows: &[ListRow]) -> Self {
        rows.iter().fold(Self::default(), |mut summary, row| {
            summary.total = summary.total.saturating_add(1);
            let tier = match row.recency {
                Recency::Fresh => &mut summary.fresh,
                Recency::Stale => &mut summary.stale,
                Recency::Old => &mut summary.old,
                Recency::Unknown => &mut summary.unknown,
            };
            *tier = tier.saturating_add(1);
            summary
        })
    }
}

/// Log one summary line, then one debug line per row.
pub fn log_rows(rows: &[ListRow]) {
    let summary = RosterSummary::of(rows);
    info!(
        total = summary.total,
        fresh = summary.fresh,
        stale = summary.stale,
        old = summary.old,
        no_data = summary.unknown,
        "Roster updated"
    );
    for row in rows {
        debug!(
            bus = %row.bus_number,
            route = row.route_number.as_deref().unwrap_or("-"),
            speed = %row.speed,
            position = row.position.as_deref().unwrap_or("-"),
            last_update = %row.last_update,
            recency = row.recency.label(),
            "bus"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bustrack_core::{ListView, MergePolicy, Roster};
    use bustrack_types::{Location, Vehicle, VehicleId};
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;

    fn vehicle(id: u32, seen: Option<DateTime<Utc>>) -> Vehicle {
        Vehicle {
            id: VehicleId(id),
            number: format!("B{id}"),
            license_plate: String::new(),
            capacity: None,
            driver_name: None,
            route: None,
            current_location: seen.map(|ts| Location::at(40.75, -73.98, Some(ts))),
        }
    }

    #[test]
    fn summary_counts_each_tier() {
        let now = Utc::now();
        let minutes_ago = |m: i64| now.checked_sub_signed(TimeDelta::minutes(m)).unwrap();

        let mut roster = Roster::new(MergePolicy::default());
        roster.replace([
            vehicle(1, Some(minutes_ago(1))),
            vehicle(2, Some(minutes_ago(10))),
            vehicle(3, Some(minutes_ago(30))),
            vehicle(4, None),
        ]);
        let rows = ListView::default().rows(&roster, now);

        assert_eq!(
            RosterSummary::of(&rows),
            RosterSummary {
                total: 4,
                fresh: 1,
                stale: 1,
                old: 1,
                unknown: 1,
            }
        );
    }

    #[test]
    fn empty_list_summarizes_to_zero() {
        assert_eq!(RosterSummary::of(&[]), RosterSummary::default());
    }
}
