//! Insights queries: heatmap, streaks, and activity summary.
//!
//! Read-only over entries. Every query resolves the owner's day boundary
//! from stored preferences first, so heatmap cells and streak days agree.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use daybook_core::{
    parse_timezone, within, ActivitySummary, DayBoundary, EngineConfig, EntryRepository, Error,
    Heatmap, PreferencesRepository, Result, StreakInfo, UserPreferences,
};

use crate::heatmap::{active_days, build_heatmap};
use crate::streak::compute_streak;

#[derive(Clone)]
pub struct InsightsService {
    entries: Arc<dyn EntryRepository>,
    preferences: Arc<dyn PreferencesRepository>,
    config: EngineConfig,
}

impl InsightsService {
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        preferences: Arc<dyn PreferencesRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            entries,
            preferences,
            config,
        }
    }

    /// Build from one backend implementing both repositories.
    pub fn from_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: EntryRepository + PreferencesRepository + 'static,
    {
        Self::new(store.clone(), store, config)
    }

    /// The owner's day boundary, falling back to the configured timezone.
    pub async fn day_boundary(&self, owner_id: Uuid) -> Result<DayBoundary> {
        let prefs = within(
            self.config.store_timeout,
            "get_preferences",
            self.preferences.get(owner_id),
        )
        .await?;
        let boundary = DayBoundary::from_preferences(prefs.as_ref(), self.config.default_timezone);
        debug!(
            subsystem = "insights",
            component = "insights_service",
            owner_id = %owner_id,
            timezone = %boundary.timezone(),
            day_ends_at = ?boundary.day_ends_at(),
            "Resolved day boundary"
        );
        Ok(boundary)
    }

    /// Entry counts for every day in `from..=to`, in the owner's days.
    ///
    /// `from` after `to` returns an empty heatmap. Ranges wider than the
    /// configured maximum are rejected.
    pub async fn heatmap(&self, owner_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Heatmap> {
        if from > to {
            return Ok(Heatmap::default());
        }
        let span = (to - from).num_days() + 1;
        if span > self.config.max_heatmap_days {
            return Err(Error::InvalidInput(format!(
                "Heatmap range spans {} days, maximum is {}",
                span, self.config.max_heatmap_days
            )));
        }

        let start = Instant::now();
        let boundary = self.day_boundary(owner_id).await?;
        // Pad the UTC window by a day on each side; `build_heatmap` keeps
        // only timestamps whose `day_of` falls in range.
        let lower = boundary.start_of(from) - Duration::days(1);
        let upper = to
            .succ_opt()
            .map(|next| boundary.start_of(next) + Duration::days(1));

        let timestamps = within(
            self.config.store_timeout,
            "entry_timestamps",
            self.entries.entry_timestamps(owner_id, Some(lower), upper),
        )
        .await?;
        let heatmap = build_heatmap(&boundary, &timestamps, from, to);

        info!(
            subsystem = "insights",
            component = "insights_service",
            op = "heatmap",
            owner_id = %owner_id,
            day_count = heatmap.len(),
            active_days = heatmap.active_days(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Heatmap computed"
        );
        Ok(heatmap)
    }

    /// Current and longest streaks as of `as_of`. Entries created after
    /// `as_of` are not counted.
    pub async fn streak(&self, owner_id: Uuid, as_of: DateTime<Utc>) -> Result<StreakInfo> {
        let start = Instant::now();
        let boundary = self.day_boundary(owner_id).await?;
        let timestamps = self.timestamps_until(owner_id, as_of).await?;
        let streak = compute_streak(&active_days(&boundary, &timestamps), boundary.today(as_of));

        info!(
            subsystem = "insights",
            component = "insights_service",
            op = "streak",
            owner_id = %owner_id,
            current = streak.current,
            longest = streak.longest,
            duration_ms = start.elapsed().as_millis() as u64,
            "Streak computed"
        );
        Ok(streak)
    }

    /// Totals, per-type counts, and streaks in one call.
    pub async fn summary(&self, owner_id: Uuid, as_of: DateTime<Utc>) -> Result<ActivitySummary> {
        let start = Instant::now();
        let boundary = self.day_boundary(owner_id).await?;
        let timestamps = self.timestamps_until(owner_id, as_of).await?;
        let counts = within(
            self.config.store_timeout,
            "count_by_type",
            self.entries.count_by_type(owner_id, Some(as_of)),
        )
        .await?;

        let days = active_days(&boundary, &timestamps);
        let summary = ActivitySummary {
            total_entries: timestamps.len() as i64,
            active_days: days.len(),
            entries_by_type: counts.into_iter().collect::<BTreeMap<_, _>>(),
            streak: compute_streak(&days, boundary.today(as_of)),
        };

        info!(
            subsystem = "insights",
            component = "insights_service",
            op = "summary",
            owner_id = %owner_id,
            total_entries = summary.total_entries,
            day_count = summary.active_days,
            duration_ms = start.elapsed().as_millis() as u64,
            "Summary computed"
        );
        Ok(summary)
    }

    /// Stored preferences, or the defaults when none are stored.
    pub async fn get_preferences(&self, owner_id: Uuid) -> Result<UserPreferences> {
        let stored = within(
            self.config.store_timeout,
            "get_preferences",
            self.preferences.get(owner_id),
        )
        .await?;
        Ok(stored.unwrap_or_else(|| UserPreferences {
            owner_id,
            timezone: self.config.default_timezone.name().to_string(),
            day_ends_at: None,
        }))
    }

    /// Validate and store an owner's timezone and day-end cutoff.
    ///
    /// The timezone is stored under its canonical IANA name; a midnight
    /// cutoff is stored as no cutoff.
    pub async fn set_preferences(&self, prefs: UserPreferences) -> Result<UserPreferences> {
        let tz = parse_timezone(prefs.timezone.trim())?;
        let boundary = DayBoundary::new(tz, prefs.day_ends_at)?;
        let normalized = UserPreferences {
            owner_id: prefs.owner_id,
            timezone: tz.name().to_string(),
            day_ends_at: boundary.day_ends_at(),
        };

        within(
            self.config.store_timeout,
            "upsert_preferences",
            self.preferences.upsert(&normalized),
        )
        .await?;
        info!(
            subsystem = "insights",
            component = "insights_service",
            op = "set_preferences",
            owner_id = %normalized.owner_id,
            timezone = %normalized.timezone,
            day_ends_at = ?normalized.day_ends_at,
            "Preferences updated"
        );
        Ok(normalized)
    }

    async fn timestamps_until(
        &self,
        owner_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        within(
            self.config.store_timeout,
            "entry_timestamps",
            self.entries.entry_timestamps(owner_id, None, Some(as_of)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::{NaiveTime, TimeZone};
    use daybook_core::{new_v7, Entry, EntryType, MemoryStore};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed(
        store: &MemoryStore,
        owner_id: Uuid,
        entry_type: EntryType,
        ts: DateTime<Utc>,
    ) -> Uuid {
        let entry = Entry {
            id: new_v7(),
            owner_id,
            entry_type,
            title: None,
            body: None,
            starred: false,
            metadata: None,
            created_at_utc: ts,
            updated_at_utc: ts,
            deleted_at: None,
        };
        let id = entry.id;
        store.seed_entry(entry).await;
        id
    }

    fn service(store: &Arc<MemoryStore>) -> InsightsService {
        InsightsService::from_store(store.clone(), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_heatmap_fills_every_day() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        seed(&store, owner, EntryType::Journal, at(2026, 3, 2, 8, 0)).await;
        seed(&store, owner, EntryType::Idea, at(2026, 3, 4, 21, 30)).await;

        let heatmap = service(&store)
            .heatmap(owner, date(2026, 3, 2), date(2026, 3, 6))
            .await
            .unwrap();
        let counts: Vec<u32> = heatmap.days.values().copied().collect();
        assert_eq!(heatmap.len(), 5);
        assert_eq!(counts, vec![1, 0, 1, 0, 0]);
    }

    #[tokio::test]
    async fn test_heatmap_excludes_deleted_and_other_owners() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let gone = seed(&store, owner, EntryType::Note, at(2026, 3, 2, 8, 0)).await;
        seed(&store, Uuid::new_v4(), EntryType::Note, at(2026, 3, 2, 9, 0)).await;
        store.soft_delete(owner, gone).await.unwrap();

        let heatmap = service(&store)
            .heatmap(owner, date(2026, 3, 2), date(2026, 3, 2))
            .await
            .unwrap();
        assert_eq!(heatmap.total(), 0);
        assert_eq!(heatmap.len(), 1);
    }

    #[tokio::test]
    async fn test_heatmap_reversed_range_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let heatmap = service(&store)
            .heatmap(Uuid::new_v4(), date(2026, 3, 6), date(2026, 3, 2))
            .await
            .unwrap();
        assert!(heatmap.is_empty());
    }

    #[tokio::test]
    async fn test_heatmap_range_cap() {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig::default().with_max_heatmap_days(7);
        let svc = InsightsService::from_store(store.clone(), config);

        assert!(svc
            .heatmap(Uuid::new_v4(), date(2026, 3, 1), date(2026, 3, 7))
            .await
            .is_ok());
        let err = svc
            .heatmap(Uuid::new_v4(), date(2026, 3, 1), date(2026, 3, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_heatmap_uses_owner_cutoff_and_timezone() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let svc = service(&store);
        svc.set_preferences(UserPreferences {
            owner_id: owner,
            timezone: "America/New_York".into(),
            day_ends_at: Some(NaiveTime::from_hms_opt(3, 0, 0).unwrap()),
        })
        .await
        .unwrap();

        // 06:30 UTC on the 11th is 02:30 EDT, before the 03:00 cutoff.
        seed(&store, owner, EntryType::Journal, at(2026, 6, 11, 6, 30)).await;
        // 07:30 UTC on the 11th is 03:30 EDT.
        seed(&store, owner, EntryType::Journal, at(2026, 6, 11, 7, 30)).await;

        let heatmap = svc
            .heatmap(owner, date(2026, 6, 10), date(2026, 6, 11))
            .await
            .unwrap();
        assert_eq!(heatmap.days[&date(2026, 6, 10)], 1);
        assert_eq!(heatmap.days[&date(2026, 6, 11)], 1);
    }

    #[tokio::test]
    async fn test_heatmap_counts_entries_after_dst_gap_cutoff() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let svc = service(&store);
        svc.set_preferences(UserPreferences {
            owner_id: owner,
            timezone: "America/New_York".into(),
            day_ends_at: Some(NaiveTime::from_hms_opt(2, 30, 0).unwrap()),
        })
        .await
        .unwrap();

        // 07:15 UTC on 2026-03-08 is 03:15 EDT, just after the skipped hour.
        seed(&store, owner, EntryType::Journal, at(2026, 3, 8, 7, 15)).await;

        let day = date(2026, 3, 8);
        let heatmap = svc.heatmap(owner, day, day).await.unwrap();
        assert_eq!(heatmap.len(), 1);
        assert_eq!(heatmap.days[&day], 1);
    }

    #[tokio::test]
    async fn test_heatmap_ignores_neighbouring_days() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        seed(&store, owner, EntryType::Note, at(2026, 3, 1, 12, 0)).await;
        seed(&store, owner, EntryType::Note, at(2026, 3, 2, 12, 0)).await;
        seed(&store, owner, EntryType::Note, at(2026, 3, 3, 12, 0)).await;

        let day = date(2026, 3, 2);
        let heatmap = service(&store).heatmap(owner, day, day).await.unwrap();
        assert_eq!(heatmap.len(), 1);
        assert_eq!(heatmap.total(), 1);
    }

    #[tokio::test]
    async fn test_heatmap_edge_timestamps_fall_in_range() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        seed(&store, owner, EntryType::Note, at(2026, 3, 2, 0, 0)).await;
        let last_second = Utc.with_ymd_and_hms(2026, 3, 2, 23, 59, 59).unwrap();
        seed(&store, owner, EntryType::Note, last_second).await;
        seed(&store, owner, EntryType::Note, at(2026, 3, 3, 0, 0)).await;

        let heatmap = service(&store)
            .heatmap(owner, date(2026, 3, 2), date(2026, 3, 2))
            .await
            .unwrap();
        assert_eq!(heatmap.days[&date(2026, 3, 2)], 2);
    }

    #[tokio::test]
    async fn test_streak_consecutive_days() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        for day in 2..=4 {
            seed(&store, owner, EntryType::Journal, at(2026, 3, day, 12, 0)).await;
        }

        let info = service(&store)
            .streak(owner, at(2026, 3, 4, 20, 0))
            .await
            .unwrap();
        assert_eq!((info.current, info.longest), (3, 3));
    }

    #[tokio::test]
    async fn test_streak_gap() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        for day in [2, 3, 5] {
            seed(&store, owner, EntryType::Journal, at(2026, 3, day, 12, 0)).await;
        }

        let info = service(&store)
            .streak(owner, at(2026, 3, 5, 20, 0))
            .await
            .unwrap();
        assert_eq!((info.current, info.longest), (1, 2));
    }

    #[tokio::test]
    async fn test_streak_without_entries() {
        let store = Arc::new(MemoryStore::new());
        let info = service(&store)
            .streak(Uuid::new_v4(), at(2026, 3, 5, 20, 0))
            .await
            .unwrap();
        assert_eq!(info, StreakInfo::default());
    }

    #[tokio::test]
    async fn test_streak_ignores_entries_after_as_of() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        seed(&store, owner, EntryType::Journal, at(2026, 3, 2, 12, 0)).await;
        seed(&store, owner, EntryType::Journal, at(2026, 3, 3, 12, 0)).await;

        let info = service(&store)
            .streak(owner, at(2026, 3, 3, 9, 0))
            .await
            .unwrap();
        assert_eq!(info.current, 1);
        assert_eq!(info.last_active_day, Some(date(2026, 3, 2)));
    }

    #[tokio::test]
    async fn test_writing_after_midnight_before_cutoff_keeps_streak() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let svc = service(&store);
        svc.set_preferences(UserPreferences {
            owner_id: owner,
            timezone: "UTC".into(),
            day_ends_at: Some(NaiveTime::from_hms_opt(4, 0, 0).unwrap()),
        })
        .await
        .unwrap();

        seed(&store, owner, EntryType::Journal, at(2026, 3, 2, 22, 0)).await;
        // 01:00 on the 4th belongs to the 3rd
        seed(&store, owner, EntryType::Journal, at(2026, 3, 4, 1, 0)).await;

        let info = svc.streak(owner, at(2026, 3, 4, 2, 0)).await.unwrap();
        assert_eq!(info.current, 2);
        assert_eq!(info.last_active_day, Some(date(2026, 3, 3)));
    }

    #[tokio::test]
    async fn test_summary() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        seed(&store, owner, EntryType::Journal, at(2026, 3, 2, 8, 0)).await;
        seed(&store, owner, EntryType::Journal, at(2026, 3, 2, 9, 0)).await;
        seed(&store, owner, EntryType::Dream, at(2026, 3, 3, 7, 0)).await;
        seed(&store, owner, EntryType::Idea, at(2026, 3, 9, 7, 0)).await;

        let summary = service(&store)
            .summary(owner, at(2026, 3, 3, 23, 0))
            .await
            .unwrap();
        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.active_days, 2);
        assert_eq!(summary.entries_by_type.get(&EntryType::Journal), Some(&2));
        assert_eq!(summary.entries_by_type.get(&EntryType::Dream), Some(&1));
        assert_eq!(summary.entries_by_type.get(&EntryType::Idea), None);
        assert_eq!(summary.streak.current, 2);
    }

    #[tokio::test]
    async fn test_set_preferences_validates() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let owner = Uuid::new_v4();

        let bad_tz = svc
            .set_preferences(UserPreferences {
                owner_id: owner,
                timezone: "Atlantis/Capital".into(),
                day_ends_at: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(bad_tz, Error::InvalidInput(_)));

        let late_cutoff = svc
            .set_preferences(UserPreferences {
                owner_id: owner,
                timezone: "UTC".into(),
                day_ends_at: Some(NaiveTime::from_hms_opt(13, 0, 0).unwrap()),
            })
            .await
            .unwrap_err();
        assert!(matches!(late_cutoff, Error::InvalidInput(_)));

        let defaults = svc.get_preferences(owner).await.unwrap();
        assert_eq!(defaults.timezone, "UTC");
        assert_eq!(defaults.day_ends_at, None);
    }

    #[tokio::test]
    async fn test_set_preferences_normalizes_midnight() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let owner = Uuid::new_v4();

        let stored = svc
            .set_preferences(UserPreferences {
                owner_id: owner,
                timezone: " Europe/Berlin ".into(),
                day_ends_at: Some(NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            })
            .await
            .unwrap();
        assert_eq!(stored.timezone, "Europe/Berlin");
        assert_eq!(stored.day_ends_at, None);
        assert_eq!(svc.get_preferences(owner).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_invalid_stored_timezone_falls_back() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        store
            .upsert(&UserPreferences {
                owner_id: owner,
                timezone: "Not/AZone".into(),
                day_ends_at: None,
            })
            .await
            .unwrap();

        let config = EngineConfig::default().with_default_timezone(chrono_tz::Tz::Asia__Tokyo);
        let svc = InsightsService::from_store(store.clone(), config);
        let boundary = svc.day_boundary(owner).await.unwrap();
        assert_eq!(boundary.timezone(), chrono_tz::Tz::Asia__Tokyo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let store = Arc::new(MemoryStore::new().with_latency(StdDuration::from_secs(10)));
        let config = EngineConfig::default().with_store_timeout(StdDuration::from_millis(100));
        let svc = InsightsService::from_store(store.clone(), config);

        let err = svc
            .streak(Uuid::new_v4(), at(2026, 3, 3, 0, 0))
            .await
            .unwrap_err();
        assert!(err.is_persistence());
    }
}
