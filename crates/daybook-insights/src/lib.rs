//! # daybook-insights
//!
//! Derived activity analytics over an owner's entry timeline: a per-day
//! heatmap and consecutive-day streaks, both attributed to days using the
//! owner's timezone and "day ends at" preference.
//!
//! [`heatmap`] and [`streak`] are pure functions over timestamps and days;
//! [`InsightsService`] feeds them from the store.

pub mod heatmap;
pub mod service;
pub mod streak;

pub use heatmap::{active_days, bucket_by_day, build_heatmap};
pub use service::InsightsService;
pub use streak::compute_streak;
