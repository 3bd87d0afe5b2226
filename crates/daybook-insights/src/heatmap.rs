//! Per-day activity buckets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};

use daybook_core::{DayBoundary, Heatmap};

/// Count timestamps per calendar day under `boundary`.
pub fn bucket_by_day(
    boundary: &DayBoundary,
    timestamps: &[DateTime<Utc>],
) -> BTreeMap<NaiveDate, u32> {
    let mut days = BTreeMap::new();
    for ts in timestamps {
        *days.entry(boundary.day_of(*ts)).or_insert(0) += 1;
    }
    days
}

/// Distinct days with at least one timestamp.
pub fn active_days(boundary: &DayBoundary, timestamps: &[DateTime<Utc>]) -> BTreeSet<NaiveDate> {
    timestamps.iter().map(|ts| boundary.day_of(*ts)).collect()
}

/// Heatmap over `from..=to` with an explicit count for every day.
///
/// Timestamps that fall outside the range once attributed to a day are
/// ignored. `from` after `to` yields an empty heatmap.
pub fn build_heatmap(
    boundary: &DayBoundary,
    timestamps: &[DateTime<Utc>],
    from: NaiveDate,
    to: NaiveDate,
) -> Heatmap {
    let mut days = BTreeMap::new();
    let mut day = from;
    while day <= to {
        days.insert(day, 0);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    for (day, count) in bucket_by_day(boundary, timestamps) {
        if let Some(slot) = days.get_mut(&day) {
            *slot += count;
        }
    }

    Heatmap { days }
}
