//! Consecutive-day streaks over an owner's active days.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use daybook_core::StreakInfo;

/// Compute current and longest streaks as of `today`.
///
/// A run is a maximal sequence of active days with no calendar day missing
/// between them. The run ending at the most recent active day is current
/// only if that day is `today` or the day before; otherwise `current` is 0.
/// Active days after `today` are not considered.
pub fn compute_streak(active_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakInfo {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut last: Option<NaiveDate> = None;

    for &day in active_days.range(..=today) {
        run = match last {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        last = Some(day);
    }

    let current = match last {
        Some(day) if day == today || day.succ_opt() == Some(today) => run,
        _ => 0,
    };

    StreakInfo {
        current,
        longest,
        last_active_day: last,
    }
}
