//! Core traits for daybook store abstractions.
//!
//! These traits define the interfaces that concrete stores must satisfy,
//! enabling the PostgreSQL backend and the in-memory store to be swapped
//! behind the same services.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// TRANSACTIONAL WRITE PATH
// =============================================================================

/// One atomic unit of work against the store.
///
/// Every entry write and its annotation run inside a single `StoreTx`.
/// Dropping a transaction without calling [`StoreTx::commit`] rolls it back.
#[async_trait]
pub trait StoreTx: Send {
    /// Insert a new entry row.
    async fn insert_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Load a non-deleted entry owned by `owner_id` and lock it for the rest
    /// of the transaction. Returns `None` when absent, deleted, or owned by
    /// someone else.
    async fn lock_entry(&mut self, owner_id: Uuid, entry_id: Uuid) -> Result<Option<Entry>>;

    /// Persist title, body, starred flag, metadata, and `updated_at_utc`.
    async fn update_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Find a catalog row by name, ignoring case.
    async fn find_by_name(
        &mut self,
        kind: CatalogKind,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogRef>>;

    /// Create a catalog row. Fails with `Error::Conflict` when a row with the
    /// same case-insensitive name already exists for the owner.
    async fn create_catalog_row(
        &mut self,
        kind: CatalogKind,
        owner_id: Uuid,
        name: &str,
    ) -> Result<CatalogRef>;

    /// Catalog rows currently associated with an entry.
    async fn linked(&mut self, kind: CatalogKind, entry_id: Uuid) -> Result<Vec<CatalogRef>>;

    /// Associate a catalog row with an entry. Linking twice is a no-op.
    async fn link(&mut self, kind: CatalogKind, entry_id: Uuid, item_id: Uuid) -> Result<()>;

    /// Remove an association. The catalog row itself is untouched.
    async fn unlink(&mut self, kind: CatalogKind, entry_id: Uuid, item_id: Uuid) -> Result<()>;

    /// Make every change in this transaction visible, or none of them.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every change in this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Store that can open write transactions.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

// =============================================================================
// ENTRY REPOSITORY
// =============================================================================

/// Read-side and lifecycle operations on entries.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Fetch a non-deleted entry with its associations and attachments.
    async fn fetch(&self, owner_id: Uuid, entry_id: Uuid) -> Result<EntryFull>;

    /// List non-deleted entries, newest first.
    async fn list(&self, owner_id: Uuid, req: ListEntriesRequest) -> Result<ListEntriesResponse>;

    /// Soft-delete an entry (sets `deleted_at`).
    async fn soft_delete(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()>;

    /// Clear `deleted_at` on a soft-deleted entry.
    async fn restore(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()>;

    /// Creation timestamps of non-deleted entries, ascending, optionally
    /// bounded (inclusive) on either side.
    async fn entry_timestamps(
        &self,
        owner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DateTime<Utc>>>;

    /// Count non-deleted entries per type, created at or before `until`.
    async fn count_by_type(
        &self,
        owner_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<(EntryType, i64)>>;

    /// Record an attachment reference on an entry.
    async fn add_attachment(&self, owner_id: Uuid, attachment: NewAttachment)
        -> Result<Attachment>;

    /// Remove an attachment reference.
    async fn remove_attachment(&self, owner_id: Uuid, attachment_id: Uuid) -> Result<()>;
}

// =============================================================================
// CATALOG REPOSITORY
// =============================================================================

/// Explicit user management of the tag and person catalogs.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All tags for an owner with entry counts, ordered by name.
    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<Tag>>;

    /// All people for an owner with entry counts, ordered by name.
    async fn list_people(&self, owner_id: Uuid) -> Result<Vec<Person>>;

    /// Set or clear a tag's display color.
    async fn set_tag_color(&self, owner_id: Uuid, tag_id: Uuid, color: Option<String>)
        -> Result<Tag>;

    /// Set or clear a person's group label.
    async fn set_person_group(
        &self,
        owner_id: Uuid,
        person_id: Uuid,
        group_label: Option<String>,
    ) -> Result<Person>;

    /// Delete a tag and detach it from every entry.
    async fn delete_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()>;

    /// Delete a person and detach them from every entry.
    async fn delete_person(&self, owner_id: Uuid, person_id: Uuid) -> Result<()>;
}

// =============================================================================
// PREFERENCES REPOSITORY
// =============================================================================

/// Per-owner preferences.
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    async fn get(&self, owner_id: Uuid) -> Result<Option<UserPreferences>>;

    async fn upsert(&self, prefs: &UserPreferences) -> Result<()>;
}

// =============================================================================
// HELPERS
// =============================================================================

/// Await a store call, converting expiry of `timeout` into `Error::Timeout`.
pub async fn within<T, F>(timeout: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{} exceeded {}ms",
            op,
            timeout.as_millis()
        ))),
    }
}
