//! Core data models for daybook.
//!
//! These types are shared across all daybook crates and represent the
//! core domain entities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{MAX_TITLE_LEN, RATING_MAX, RATING_MIN};
use crate::error::{Error, Result};

// =============================================================================
// ENTRY TYPES
// =============================================================================

/// Kind of journaled content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Journal,
    Dream,
    Highlight,
    Idea,
    Wisdom,
    Note,
}

impl EntryType {
    pub const ALL: [EntryType; 6] = [
        EntryType::Journal,
        EntryType::Dream,
        EntryType::Highlight,
        EntryType::Idea,
        EntryType::Wisdom,
        EntryType::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Journal => "journal",
            EntryType::Dream => "dream",
            EntryType::Highlight => "highlight",
            EntryType::Idea => "idea",
            EntryType::Wisdom => "wisdom",
            EntryType::Note => "note",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "journal" => Ok(EntryType::Journal),
            "dream" => Ok(EntryType::Dream),
            "highlight" => Ok(EntryType::Highlight),
            "idea" => Ok(EntryType::Idea),
            "wisdom" => Ok(EntryType::Wisdom),
            "note" => Ok(EntryType::Note),
            other => Err(Error::InvalidInput(format!("Unknown entry type: {}", other))),
        }
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// Importance of a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    High,
    Medium,
    Low,
}

/// Kind of wisdom captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WisdomType {
    Quote,
    Thought,
    Fact,
    Excerpt,
    Lesson,
}

/// Type-specific metadata, discriminated by entry type.
///
/// Serialized with a `type` tag matching [`EntryType`], so the stored JSON
/// always carries its own discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryMetadata {
    Journal {
        category: Option<String>,
        /// 1 (low) to 5 (high)
        mood: Option<u8>,
    },
    Dream {
        atmosphere: Option<String>,
        /// 1 (hazy) to 5 (vivid)
        clarity: Option<u8>,
    },
    Highlight {
        linked_entry_id: Option<Uuid>,
        importance: Option<Importance>,
    },
    Idea {
        status: Option<String>,
    },
    Wisdom {
        wisdom_type: Option<WisdomType>,
        author: Option<String>,
        source: Option<String>,
    },
    Note {
        #[serde(default)]
        is_pinned: bool,
        color: Option<String>,
    },
}

impl EntryMetadata {
    /// The entry type this metadata shape belongs to.
    pub fn entry_type(&self) -> EntryType {
        match self {
            EntryMetadata::Journal { .. } => EntryType::Journal,
            EntryMetadata::Dream { .. } => EntryType::Dream,
            EntryMetadata::Highlight { .. } => EntryType::Highlight,
            EntryMetadata::Idea { .. } => EntryType::Idea,
            EntryMetadata::Wisdom { .. } => EntryType::Wisdom,
            EntryMetadata::Note { .. } => EntryType::Note,
        }
    }

    /// Reject metadata whose shape does not match `entry_type`, or whose
    /// ratings and colors are out of range.
    pub fn validate_for(&self, entry_type: EntryType) -> Result<()> {
        if self.entry_type() != entry_type {
            return Err(Error::InvalidInput(format!(
                "{} metadata cannot be attached to a {} entry",
                self.entry_type(),
                entry_type
            )));
        }

        match self {
            EntryMetadata::Journal { mood, .. } => validate_rating("mood", *mood),
            EntryMetadata::Dream { clarity, .. } => validate_rating("clarity", *clarity),
            EntryMetadata::Note {
                color: Some(color), ..
            } => validate_color(color),
            _ => Ok(()),
        }
    }
}

fn validate_rating(field: &str, value: Option<u8>) -> Result<()> {
    match value {
        Some(v) if !(RATING_MIN..=RATING_MAX).contains(&v) => Err(Error::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            field, RATING_MIN, RATING_MAX, v
        ))),
        _ => Ok(()),
    }
}

/// Validate a `#RRGGBB` display color.
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Color must be a #RRGGBB hex value, got '{}'",
            color
        )))
    }
}

/// Validate an entry title.
pub fn validate_title(title: &str) -> Result<()> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::InvalidInput(format!(
            "Title must be {} characters or less",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

// =============================================================================
// ENTRIES
// =============================================================================

/// A single journaled unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub entry_type: EntryType,
    pub title: Option<String>,
    /// Markdown body.
    pub body: Option<String>,
    pub starred: bool,
    pub metadata: Option<EntryMetadata>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Body text as scanned by the annotation pipeline (`None` scans as empty).
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Reference to a catalog row (tag or person) as returned to the write path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRef {
    pub id: Uuid,
    pub name: String,
}

pub type TagRef = CatalogRef;
pub type PersonRef = CatalogRef;

/// The tag and person associations of one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub tags: Vec<TagRef>,
    pub people: Vec<PersonRef>,
}

impl Annotations {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn person_names(&self) -> Vec<&str> {
        self.people.iter().map(|p| p.name.as_str()).collect()
    }

    /// Sort both lists by case-insensitive name for stable presentation.
    pub fn sorted(mut self) -> Self {
        sort_refs(&mut self.tags);
        sort_refs(&mut self.people);
        self
    }
}

/// Sort catalog references by lowercased name, then id.
pub fn sort_refs(refs: &mut [CatalogRef]) {
    refs.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// A file reference attached to an entry. Bytes live in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub blob_key: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at_utc: DateTime<Utc>,
}

/// Request for recording a new attachment reference.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub entry_id: Uuid,
    pub blob_key: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

/// Entry with its associations and attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryFull {
    pub entry: Entry,
    pub tags: Vec<TagRef>,
    pub people: Vec<PersonRef>,
    pub attachments: Vec<Attachment>,
}

impl EntryFull {
    pub fn annotations(&self) -> Annotations {
        Annotations {
            tags: self.tags.clone(),
            people: self.people.clone(),
        }
    }
}

/// Request for creating a new entry.
#[derive(Debug, Clone)]
pub struct CreateEntryRequest {
    pub entry_type: EntryType,
    pub title: Option<String>,
    pub body: Option<String>,
    pub starred: bool,
    pub metadata: Option<EntryMetadata>,
}

impl CreateEntryRequest {
    pub fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            title: None,
            body: None,
            starred: false,
            metadata: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Request for updating an entry. `None` fields are left unchanged; an empty
/// title or body clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub starred: Option<bool>,
    pub metadata: Option<EntryMetadata>,
}

impl UpdateEntryRequest {
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Default::default()
        }
    }
}

/// Request for listing entries.
#[derive(Debug, Clone, Default)]
pub struct ListEntriesRequest {
    pub entry_type: Option<EntryType>,
    pub starred: Option<bool>,
    /// Case-insensitive tag name filter
    pub tag: Option<String>,
    /// Case-insensitive person name filter
    pub person: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing entries, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntriesResponse {
    pub entries: Vec<Entry>,
    pub total: i64,
}

// =============================================================================
// CATALOG
// =============================================================================

/// Which per-owner catalog a reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Tag,
    Person,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Tag => "tag",
            CatalogKind::Person => "person",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    /// Number of non-deleted entries with this tag (computed)
    #[serde(default)]
    pub entry_count: i64,
}

/// A person catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub group_label: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    /// Number of non-deleted entries mentioning this person (computed)
    #[serde(default)]
    pub entry_count: i64,
}

// =============================================================================
// PREFERENCES
// =============================================================================

/// Per-owner settings read by the insights queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub owner_id: Uuid,
    /// IANA timezone name, e.g. "Europe/Berlin"
    pub timezone: String,
    /// Entries written before this local time count toward the previous day.
    pub day_ends_at: Option<NaiveTime>,
}

// =============================================================================
// INSIGHTS
// =============================================================================

/// Per-day entry counts, ascending by day, with every day of the requested
/// range present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub days: BTreeMap<NaiveDate, u32>,
}

impl Heatmap {
    pub fn total(&self) -> u64 {
        self.days.values().map(|&c| u64::from(c)).sum()
    }

    pub fn active_days(&self) -> usize {
        self.days.values().filter(|&&c| c > 0).count()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Current and longest run of consecutive active days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakInfo {
    pub current: u32,
    pub longest: u32,
    pub last_active_day: Option<NaiveDate>,
}

/// One-call overview for an insights dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub total_entries: i64,
    pub active_days: usize,
    pub entries_by_type: BTreeMap<EntryType, i64>,
    pub streak: StreakInfo,
}
