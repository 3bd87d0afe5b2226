//! Centralized default constants for daybook.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// REFERENCES
// =============================================================================

/// Longest `#tag` / `@person` name the scanner accepts, in characters.
/// Longer runs are ignored rather than truncated.
pub const MAX_REFERENCE_LEN: usize = 100;

/// Longest entry title, in characters.
pub const MAX_TITLE_LEN: usize = 500;

// =============================================================================
// STORE
// =============================================================================

/// Default timeout applied to each store call made by the services.
pub const STORE_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// INSIGHTS
// =============================================================================

/// Default timezone for owners without a stored preference.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Upper bound on heatmap buckets per request (about five years).
pub const MAX_HEATMAP_DAYS: i64 = 1830;

/// A custom day-end cutoff must fall strictly before this hour.
pub const DAY_ENDS_AT_MAX_HOUR: u32 = 12;

// =============================================================================
// METADATA
// =============================================================================

/// Inclusive bounds for journal mood and dream clarity ratings.
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for entry listings.
pub const PAGE_LIMIT: i64 = 50;

/// Largest page size a caller may request.
pub const PAGE_LIMIT_MAX: i64 = 500;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;
