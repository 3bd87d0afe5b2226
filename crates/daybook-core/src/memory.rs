//! In-memory store for deterministic testing and embedding.
//!
//! Implements every store trait over a single `tokio::sync::Mutex`-guarded
//! state. A write transaction holds the lock from `begin` until it commits
//! or is dropped, so transactions are fully serialized; changes are made to
//! a working copy and swapped in on commit.
//!
//! ## Usage
//!
//! ```rust
//! use daybook_core::memory::MemoryStore;
//!
//! let store = MemoryStore::new();
//! store.fail_next_commit();
//! ```
//!
//! Failure hooks mirror what a real database can do to a caller: reject a
//! commit, lose a race on catalog creation, or respond slowly.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX, PAGE_OFFSET};
use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;
use crate::uuid_utils::new_v7;

/// Counts of catalog mutations made by committed transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub created: usize,
    pub linked: usize,
    pub unlinked: usize,
}

impl MutationStats {
    pub fn total(&self) -> usize {
        self.created + self.linked + self.unlinked
    }
}

#[derive(Debug, Clone)]
struct CatalogRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    /// Tag color or person group label.
    extra: Option<String>,
    created_at_utc: DateTime<Utc>,
}

impl CatalogRow {
    fn as_ref(&self) -> CatalogRef {
        CatalogRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    entries: HashMap<Uuid, Entry>,
    tags: HashMap<Uuid, CatalogRow>,
    people: HashMap<Uuid, CatalogRow>,
    /// (entry_id, tag_id)
    tag_links: BTreeSet<(Uuid, Uuid)>,
    /// (entry_id, person_id)
    person_links: BTreeSet<(Uuid, Uuid)>,
    attachments: HashMap<Uuid, Attachment>,
    preferences: HashMap<Uuid, UserPreferences>,
    stats: MutationStats,
}

impl MemoryState {
    fn rows(&self, kind: CatalogKind) -> &HashMap<Uuid, CatalogRow> {
        match kind {
            CatalogKind::Tag => &self.tags,
            CatalogKind::Person => &self.people,
        }
    }

    fn rows_mut(&mut self, kind: CatalogKind) -> &mut HashMap<Uuid, CatalogRow> {
        match kind {
            CatalogKind::Tag => &mut self.tags,
            CatalogKind::Person => &mut self.people,
        }
    }

    fn links(&self, kind: CatalogKind) -> &BTreeSet<(Uuid, Uuid)> {
        match kind {
            CatalogKind::Tag => &self.tag_links,
            CatalogKind::Person => &self.person_links,
        }
    }

    fn links_mut(&mut self, kind: CatalogKind) -> &mut BTreeSet<(Uuid, Uuid)> {
        match kind {
            CatalogKind::Tag => &mut self.tag_links,
            CatalogKind::Person => &mut self.person_links,
        }
    }

    fn find_by_name(&self, kind: CatalogKind, owner_id: Uuid, name: &str) -> Option<&CatalogRow> {
        let needle = name.to_lowercase();
        self.rows(kind)
            .values()
            .find(|row| row.owner_id == owner_id && row.name.to_lowercase() == needle)
    }

    fn linked(&self, kind: CatalogKind, entry_id: Uuid) -> Vec<CatalogRef> {
        let rows = self.rows(kind);
        let mut refs: Vec<CatalogRef> = self
            .links(kind)
            .iter()
            .filter(|(e, _)| *e == entry_id)
            .filter_map(|(_, item)| rows.get(item).map(CatalogRow::as_ref))
            .collect();
        sort_refs(&mut refs);
        refs
    }

    fn visible_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Option<&Entry> {
        self.entries
            .get(&entry_id)
            .filter(|e| e.owner_id == owner_id && !e.is_deleted())
    }

    fn entry_count(&self, kind: CatalogKind, item_id: Uuid) -> i64 {
        self.links(kind)
            .iter()
            .filter(|(entry_id, item)| {
                *item == item_id
                    && self
                        .entries
                        .get(entry_id)
                        .map(|e| !e.is_deleted())
                        .unwrap_or(false)
            })
            .count() as i64
    }

    fn owned_row(&self, kind: CatalogKind, owner_id: Uuid, item_id: Uuid) -> Result<&CatalogRow> {
        self.rows(kind)
            .get(&item_id)
            .filter(|row| row.owner_id == owner_id)
            .ok_or_else(|| Error::NotFound(format!("{} {} not found", kind, item_id)))
    }

    fn delete_row(&mut self, kind: CatalogKind, owner_id: Uuid, item_id: Uuid) -> Result<()> {
        self.owned_row(kind, owner_id, item_id)?;
        self.links_mut(kind).retain(|(_, item)| *item != item_id);
        self.rows_mut(kind).remove(&item_id);
        Ok(())
    }

    fn tag(&self, row: &CatalogRow) -> Tag {
        Tag {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name.clone(),
            color: row.extra.clone(),
            created_at_utc: row.created_at_utc,
            entry_count: self.entry_count(CatalogKind::Tag, row.id),
        }
    }

    fn person(&self, row: &CatalogRow) -> Person {
        Person {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name.clone(),
            group_label: row.extra.clone(),
            created_at_utc: row.created_at_utc,
            entry_count: self.entry_count(CatalogKind::Person, row.id),
        }
    }

    fn sorted_rows(&self, kind: CatalogKind, owner_id: Uuid) -> Vec<&CatalogRow> {
        let mut rows: Vec<&CatalogRow> = self
            .rows(kind)
            .values()
            .filter(|row| row.owner_id == owner_id)
            .collect();
        rows.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    fn has_link_named(&self, kind: CatalogKind, entry_id: Uuid, name: &str) -> bool {
        let needle = name.to_lowercase();
        self.linked(kind, entry_id)
            .iter()
            .any(|r| r.name.to_lowercase() == needle)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_commit: bool,
    /// Catalog rows another writer will commit just before our insert.
    racing_inserts: Vec<(CatalogKind, Uuid, String)>,
    latency: Option<Duration>,
}

/// In-memory implementation of every daybook store trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every store call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.faults_mut().latency = Some(latency);
        self
    }

    /// The next commit fails with `Error::Persistence` and changes nothing.
    pub fn fail_next_commit(&self) {
        self.faults_mut().fail_next_commit = true;
    }

    /// Simulate a concurrent writer committing a catalog row named `name`
    /// immediately before this store's next insert of the same name.
    pub fn race_next_insert(&self, kind: CatalogKind, owner_id: Uuid, name: &str) {
        self.faults_mut()
            .racing_inserts
            .push((kind, owner_id, name.to_lowercase()));
    }

    /// Catalog mutations made by committed transactions so far.
    pub async fn mutation_stats(&self) -> MutationStats {
        self.state.lock().await.stats
    }

    /// Number of catalog rows of `kind` for an owner.
    pub async fn catalog_len(&self, kind: CatalogKind, owner_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .rows(kind)
            .values()
            .filter(|row| row.owner_id == owner_id)
            .count()
    }

    /// Insert an entry directly, bypassing the write path. For seeding
    /// analytics fixtures with fixed timestamps.
    pub async fn seed_entry(&self, entry: Entry) {
        self.state.lock().await.entries.insert(entry.id, entry);
    }

    fn faults_mut(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn delay(&self) {
        let latency = self.faults_mut().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Write transaction over a working copy of the store state.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryTx {
    fn take_racing_insert(&self, kind: CatalogKind, owner_id: Uuid, name: &str) -> bool {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        let needle = name.to_lowercase();
        match faults
            .racing_inserts
            .iter()
            .position(|(k, o, n)| *k == kind && *o == owner_id && *n == needle)
        {
            Some(idx) => {
                faults.racing_inserts.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        self.delay().await;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_entry(&mut self, entry: &Entry) -> Result<()> {
        if self.working.entries.contains_key(&entry.id) {
            return Err(Error::Conflict(format!("entry {} already exists", entry.id)));
        }
        self.working.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn lock_entry(&mut self, owner_id: Uuid, entry_id: Uuid) -> Result<Option<Entry>> {
        Ok(self.working.visible_entry(owner_id, entry_id).cloned())
    }

    async fn update_entry(&mut self, entry: &Entry) -> Result<()> {
        match self.working.entries.get_mut(&entry.id) {
            Some(stored) if stored.owner_id == entry.owner_id => {
                stored.title = entry.title.clone();
                stored.body = entry.body.clone();
                stored.starred = entry.starred;
                stored.metadata = entry.metadata.clone();
                stored.updated_at_utc = entry.updated_at_utc;
                Ok(())
            }
            _ => Err(Error::EntryNotFound(entry.id)),
        }
    }

    async fn find_by_name(
        &mut self,
        kind: CatalogKind,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogRef>> {
        Ok(self
            .working
            .find_by_name(kind, owner_id, name)
            .map(CatalogRow::as_ref))
    }

    async fn create_catalog_row(
        &mut self,
        kind: CatalogKind,
        owner_id: Uuid,
        name: &str,
    ) -> Result<CatalogRef> {
        if self.take_racing_insert(kind, owner_id, name) {
            // The other writer's row is committed: visible to us and durable.
            let row = CatalogRow {
                id: new_v7(),
                owner_id,
                name: name.to_string(),
                extra: None,
                created_at_utc: Utc::now(),
            };
            self.guard.rows_mut(kind).insert(row.id, row.clone());
            self.working.rows_mut(kind).insert(row.id, row);
            debug!(
                subsystem = "memory",
                kind = %kind,
                name,
                "Simulated concurrent catalog insert"
            );
        }

        if self.working.find_by_name(kind, owner_id, name).is_some() {
            return Err(Error::Conflict(format!(
                "{} '{}' already exists",
                kind, name
            )));
        }

        let row = CatalogRow {
            id: new_v7(),
            owner_id,
            name: name.to_string(),
            extra: None,
            created_at_utc: Utc::now(),
        };
        let created = row.as_ref();
        self.working.rows_mut(kind).insert(row.id, row);
        self.working.stats.created += 1;
        Ok(created)
    }

    async fn linked(&mut self, kind: CatalogKind, entry_id: Uuid) -> Result<Vec<CatalogRef>> {
        Ok(self.working.linked(kind, entry_id))
    }

    async fn link(&mut self, kind: CatalogKind, entry_id: Uuid, item_id: Uuid) -> Result<()> {
        if !self.working.rows(kind).contains_key(&item_id) {
            return Err(Error::NotFound(format!("{} {} not found", kind, item_id)));
        }
        if self.working.links_mut(kind).insert((entry_id, item_id)) {
            self.working.stats.linked += 1;
        }
        Ok(())
    }

    async fn unlink(&mut self, kind: CatalogKind, entry_id: Uuid, item_id: Uuid) -> Result<()> {
        if self.working.links_mut(kind).remove(&(entry_id, item_id)) {
            self.working.stats.unlinked += 1;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let fail = {
            let mut faults = this.faults.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut faults.fail_next_commit)
        };
        if fail {
            return Err(Error::Persistence("simulated commit failure".into()));
        }
        let MemoryTx {
            mut guard, working, ..
        } = this;
        *guard = working;
        trace!(subsystem = "memory", "Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for MemoryStore {
    async fn fetch(&self, owner_id: Uuid, entry_id: Uuid) -> Result<EntryFull> {
        self.delay().await;
        let state = self.state.lock().await;
        let entry = state
            .visible_entry(owner_id, entry_id)
            .cloned()
            .ok_or(Error::EntryNotFound(entry_id))?;
        let mut attachments: Vec<Attachment> = state
            .attachments
            .values()
            .filter(|a| a.entry_id == entry_id)
            .cloned()
            .collect();
        attachments.sort_by_key(|a| (a.created_at_utc, a.id));

        Ok(EntryFull {
            tags: state.linked(CatalogKind::Tag, entry_id),
            people: state.linked(CatalogKind::Person, entry_id),
            attachments,
            entry,
        })
    }

    async fn list(&self, owner_id: Uuid, req: ListEntriesRequest) -> Result<ListEntriesResponse> {
        self.delay().await;
        let state = self.state.lock().await;
        let mut entries: Vec<Entry> = state
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && !e.is_deleted())
            .filter(|e| req.entry_type.map_or(true, |t| e.entry_type == t))
            .filter(|e| req.starred.map_or(true, |s| e.starred == s))
            .filter(|e| {
                req.tag
                    .as_deref()
                    .map_or(true, |t| state.has_link_named(CatalogKind::Tag, e.id, t))
            })
            .filter(|e| {
                req.person
                    .as_deref()
                    .map_or(true, |p| state.has_link_named(CatalogKind::Person, e.id, p))
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.created_at_utc
                .cmp(&a.created_at_utc)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = entries.len() as i64;
        let offset = req.offset.unwrap_or(PAGE_OFFSET).max(0) as usize;
        let limit = req.limit.unwrap_or(PAGE_LIMIT).clamp(1, PAGE_LIMIT_MAX) as usize;
        let entries = entries.into_iter().skip(offset).take(limit).collect();

        Ok(ListEntriesResponse { entries, total })
    }

    async fn soft_delete(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        self.delay().await;
        let mut state = self.state.lock().await;
        match state.entries.get_mut(&entry_id) {
            Some(e) if e.owner_id == owner_id && !e.is_deleted() => {
                e.deleted_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(Error::EntryNotFound(entry_id)),
        }
    }

    async fn restore(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        self.delay().await;
        let mut state = self.state.lock().await;
        match state.entries.get_mut(&entry_id) {
            Some(e) if e.owner_id == owner_id && e.is_deleted() => {
                e.deleted_at = None;
                Ok(())
            }
            _ => Err(Error::EntryNotFound(entry_id)),
        }
    }

    async fn entry_timestamps(
        &self,
        owner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DateTime<Utc>>> {
        self.delay().await;
        let state = self.state.lock().await;
        let mut stamps: Vec<DateTime<Utc>> = state
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && !e.is_deleted())
            .map(|e| e.created_at_utc)
            .filter(|ts| from.map_or(true, |f| *ts >= f) && to.map_or(true, |t| *ts <= t))
            .collect();
        stamps.sort();
        Ok(stamps)
    }

    async fn count_by_type(
        &self,
        owner_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<(EntryType, i64)>> {
        self.delay().await;
        let state = self.state.lock().await;
        let mut counts: HashMap<EntryType, i64> = HashMap::new();
        for entry in state.entries.values().filter(|e| {
            e.owner_id == owner_id
                && !e.is_deleted()
                && until.map_or(true, |u| e.created_at_utc <= u)
        }) {
            *counts.entry(entry.entry_type).or_default() += 1;
        }
        let mut counts: Vec<(EntryType, i64)> = counts.into_iter().collect();
        counts.sort();
        Ok(counts)
    }

    async fn add_attachment(
        &self,
        owner_id: Uuid,
        attachment: NewAttachment,
    ) -> Result<Attachment> {
        self.delay().await;
        let mut state = self.state.lock().await;
        if state.visible_entry(owner_id, attachment.entry_id).is_none() {
            return Err(Error::EntryNotFound(attachment.entry_id));
        }
        let stored = Attachment {
            id: new_v7(),
            entry_id: attachment.entry_id,
            blob_key: attachment.blob_key,
            file_name: attachment.file_name,
            mime_type: attachment.mime_type,
            size_bytes: attachment.size_bytes,
            created_at_utc: Utc::now(),
        };
        state.attachments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn remove_attachment(&self, owner_id: Uuid, attachment_id: Uuid) -> Result<()> {
        self.delay().await;
        let mut state = self.state.lock().await;
        let owned = state
            .attachments
            .get(&attachment_id)
            .and_then(|a| state.entries.get(&a.entry_id))
            .map(|e| e.owner_id == owner_id)
            .unwrap_or(false);
        if !owned {
            return Err(Error::NotFound(format!(
                "attachment {} not found",
                attachment_id
            )));
        }
        state.attachments.remove(&attachment_id);
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<Tag>> {
        self.delay().await;
        let state = self.state.lock().await;
        Ok(state
            .sorted_rows(CatalogKind::Tag, owner_id)
            .into_iter()
            .map(|row| state.tag(row))
            .collect())
    }

    async fn list_people(&self, owner_id: Uuid) -> Result<Vec<Person>> {
        self.delay().await;
        let state = self.state.lock().await;
        Ok(state
            .sorted_rows(CatalogKind::Person, owner_id)
            .into_iter()
            .map(|row| state.person(row))
            .collect())
    }

    async fn set_tag_color(
        &self,
        owner_id: Uuid,
        tag_id: Uuid,
        color: Option<String>,
    ) -> Result<Tag> {
        if let Some(color) = color.as_deref() {
            validate_color(color)?;
        }
        self.delay().await;
        let mut state = self.state.lock().await;
        state.owned_row(CatalogKind::Tag, owner_id, tag_id)?;
        let row = state
            .tags
            .get_mut(&tag_id)
            .ok_or_else(|| Error::NotFound(format!("tag {} not found", tag_id)))?;
        row.extra = color;
        let row = row.clone();
        Ok(state.tag(&row))
    }

    async fn set_person_group(
        &self,
        owner_id: Uuid,
        person_id: Uuid,
        group_label: Option<String>,
    ) -> Result<Person> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.owned_row(CatalogKind::Person, owner_id, person_id)?;
        let row = state
            .people
            .get_mut(&person_id)
            .ok_or_else(|| Error::NotFound(format!("person {} not found", person_id)))?;
        row.extra = group_label.filter(|g| !g.trim().is_empty());
        let row = row.clone();
        Ok(state.person(&row))
    }

    async fn delete_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.delay().await;
        self.state
            .lock()
            .await
            .delete_row(CatalogKind::Tag, owner_id, tag_id)
    }

    async fn delete_person(&self, owner_id: Uuid, person_id: Uuid) -> Result<()> {
        self.delay().await;
        self.state
            .lock()
            .await
            .delete_row(CatalogKind::Person, owner_id, person_id)
    }
}

#[async_trait]
impl PreferencesRepository for MemoryStore {
    async fn get(&self, owner_id: Uuid) -> Result<Option<UserPreferences>> {
        self.delay().await;
        Ok(self.state.lock().await.preferences.get(&owner_id).cloned())
    }

    async fn upsert(&self, prefs: &UserPreferences) -> Result<()> {
        self.delay().await;
        self.state
            .lock()
            .await
            .preferences
            .insert(prefs.owner_id, prefs.clone());
        Ok(())
    }
}
