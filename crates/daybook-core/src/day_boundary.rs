//! Calendar-day attribution for entry timestamps.
//!
//! An owner's day is defined by a timezone and an optional "day ends at"
//! cutoff. With a cutoff of 03:00, an entry written at 01:30 local time
//! belongs to the previous calendar day. Without a cutoff the day ends at
//! local midnight.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::defaults::DAY_ENDS_AT_MAX_HOUR;
use crate::error::{Error, Result};
use crate::models::UserPreferences;

/// Maps instants to the owner's calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    tz: Tz,
    day_ends_at: Option<NaiveTime>,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayBoundary {
    /// UTC midnight boundary.
    pub fn utc() -> Self {
        Self {
            tz: Tz::UTC,
            day_ends_at: None,
        }
    }

    /// Build a boundary, rejecting cutoffs at or after noon.
    pub fn new(tz: Tz, day_ends_at: Option<NaiveTime>) -> Result<Self> {
        if let Some(cutoff) = day_ends_at {
            validate_day_ends_at(cutoff)?;
        }
        Ok(Self {
            tz,
            day_ends_at: normalize_cutoff(day_ends_at),
        })
    }

    /// Resolve an owner's boundary from stored preferences.
    ///
    /// Never fails: an unknown timezone or out-of-range cutoff in stored
    /// data falls back to `fallback_tz` / midnight with a warning.
    pub fn from_preferences(prefs: Option<&UserPreferences>, fallback_tz: Tz) -> Self {
        let Some(prefs) = prefs else {
            return Self {
                tz: fallback_tz,
                day_ends_at: None,
            };
        };

        let tz = match parse_timezone(&prefs.timezone) {
            Ok(tz) => tz,
            Err(e) => {
                warn!(
                    subsystem = "core",
                    component = "day_boundary",
                    owner_id = %prefs.owner_id,
                    timezone = %prefs.timezone,
                    error = %e,
                    "Stored timezone is invalid, using fallback"
                );
                fallback_tz
            }
        };

        let day_ends_at = match prefs.day_ends_at {
            Some(cutoff) if validate_day_ends_at(cutoff).is_err() => {
                warn!(
                    subsystem = "core",
                    component = "day_boundary",
                    owner_id = %prefs.owner_id,
                    day_ends_at = %cutoff,
                    "Stored day-end cutoff is out of range, using midnight"
                );
                None
            }
            other => normalize_cutoff(other),
        };

        Self { tz, day_ends_at }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn day_ends_at(&self) -> Option<NaiveTime> {
        self.day_ends_at
    }

    /// The calendar day an instant is attributed to.
    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        let local = ts.with_timezone(&self.tz);
        let date = local.date_naive();
        match self.day_ends_at {
            Some(cutoff) if local.time() < cutoff => date.pred_opt().unwrap_or(date),
            _ => date,
        }
    }

    /// The owner's "today" at `as_of`. Writing shortly after midnight but
    /// before the cutoff still counts toward yesterday.
    pub fn today(&self, as_of: DateTime<Utc>) -> NaiveDate {
        self.day_of(as_of)
    }

    /// UTC instant at which `day` begins under this boundary.
    ///
    /// Used to turn a day range into a timestamp range for store queries.
    /// When the boundary lands in a DST gap the day begins where the gap
    /// ends, which is the first instant `day_of` attributes to `day`.
    pub fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        let start = day.and_time(self.day_ends_at.unwrap_or_default());
        match self.tz.from_local_datetime(&start) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => (1..=MAX_GAP_MINUTES)
                .map(|m| start + Duration::minutes(m))
                .find_map(|local| self.tz.from_local_datetime(&local).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&start)),
        }
    }
}

/// Longest DST gap searched when a day boundary falls inside one.
/// Transitions in the tz database are whole minutes and at most a few hours.
const MAX_GAP_MINUTES: i64 = 4 * 60;

/// Midnight as a cutoff is the same as no cutoff.
fn normalize_cutoff(cutoff: Option<NaiveTime>) -> Option<NaiveTime> {
    cutoff.filter(|c| c.num_seconds_from_midnight() != 0)
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::InvalidInput(format!("Unknown timezone: {}", name)))
}

/// Parse an "HH:mm" day-end cutoff.
pub fn parse_day_ends_at(value: &str) -> Result<NaiveTime> {
    let cutoff = NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| Error::InvalidInput(format!("Expected HH:mm, got '{}'", value)))?;
    validate_day_ends_at(cutoff)?;
    Ok(cutoff)
}

/// A cutoff must fall in the early part of the day; later values would
/// attribute most of a day's writing to the day before.
pub fn validate_day_ends_at(cutoff: NaiveTime) -> Result<()> {
    if cutoff.hour() >= DAY_ENDS_AT_MAX_HOUR {
        return Err(Error::InvalidInput(format!(
            "Day-end cutoff must be before {:02}:00, got {}",
            DAY_ENDS_AT_MAX_HOUR,
            cutoff.format("%H:%M")
        )));
    }
    Ok(())
}
