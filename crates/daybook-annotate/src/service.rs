//! Entry write path.
//!
//! Every content write and its annotation share one store transaction: a
//! reader who sees the new body also sees the matching tags and people, and
//! a failed annotation leaves the previous content in place.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use daybook_core::{
    models::validate_title, new_v7, within, Annotations, Attachment, CreateEntryRequest,
    EngineConfig, Entry, EntryFull, EntryRepository, Error, ListEntriesRequest,
    ListEntriesResponse, NewAttachment, Result, TransactionalStore, UpdateEntryRequest,
};

use crate::pipeline::{annotate_tx, PipelineOutcome};

/// Creates, edits, and manages entries, keeping annotations in step with
/// their bodies.
#[derive(Clone)]
pub struct EntryService {
    store: Arc<dyn TransactionalStore>,
    entries: Arc<dyn EntryRepository>,
    config: EngineConfig,
}

impl EntryService {
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        entries: Arc<dyn EntryRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            entries,
            config,
        }
    }

    /// Build from one backend implementing both the write and read sides.
    pub fn from_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: TransactionalStore + EntryRepository + 'static,
    {
        Self::new(store.clone(), store, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create an entry and annotate its body.
    pub async fn create_entry(&self, owner_id: Uuid, req: CreateEntryRequest) -> Result<EntryFull> {
        let start = Instant::now();
        let title = normalize_text(req.title.map(|t| t.trim().to_string()));
        if let Some(title) = title.as_deref() {
            validate_title(title)?;
        }
        if let Some(metadata) = &req.metadata {
            metadata.validate_for(req.entry_type)?;
        }

        let now = Utc::now();
        let entry = Entry {
            id: new_v7(),
            owner_id,
            entry_type: req.entry_type,
            title,
            body: normalize_text(req.body),
            starred: req.starred,
            metadata: req.metadata,
            created_at_utc: now,
            updated_at_utc: now,
            deleted_at: None,
        };

        let outcome = within(self.config.store_timeout, "create_entry", async {
            let mut tx = self.store.begin().await?;
            tx.insert_entry(&entry).await?;
            let outcome =
                annotate_tx(tx.as_mut(), owner_id, entry.id, None, entry.body_text()).await?;
            tx.commit().await?;
            Ok(outcome)
        })
        .await
        .inspect_err(|e| log_write_failure("create_entry", owner_id, entry.id, e))?;

        info!(
            subsystem = "annotate",
            component = "entry_service",
            op = "create_entry",
            owner_id = %owner_id,
            entry_id = %entry.id,
            entry_type = %entry.entry_type,
            tag_count = outcome.annotations.tags.len(),
            person_count = outcome.annotations.people.len(),
            created = outcome.stats.created,
            duration_ms = start.elapsed().as_millis() as u64,
            "Entry created"
        );

        let Annotations { tags, people } = outcome.annotations;
        Ok(EntryFull {
            entry,
            tags,
            people,
            attachments: Vec::new(),
        })
    }

    /// Apply an edit and re-annotate if the body changed.
    ///
    /// The entry row is locked for the duration, so concurrent edits of the
    /// same entry are applied one after another.
    pub async fn update_entry(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        req: UpdateEntryRequest,
    ) -> Result<EntryFull> {
        let start = Instant::now();
        if let Some(title) = req.title.as_deref() {
            validate_title(title.trim())?;
        }

        let outcome = within(self.config.store_timeout, "update_entry", async {
            let mut tx = self.store.begin().await?;
            let mut entry = tx
                .lock_entry(owner_id, entry_id)
                .await?
                .ok_or(Error::EntryNotFound(entry_id))?;
            if let Some(metadata) = &req.metadata {
                metadata.validate_for(entry.entry_type)?;
            }

            let previous_body = entry.body.clone();
            if apply_update(&mut entry, req) {
                entry.updated_at_utc = Utc::now();
                tx.update_entry(&entry).await?;
            }

            let previous = previous_body.as_deref().unwrap_or_default();
            let outcome = annotate_tx(
                tx.as_mut(),
                owner_id,
                entry_id,
                Some(previous),
                entry.body_text(),
            )
            .await?;
            tx.commit().await?;
            Ok(outcome)
        })
        .await
        .inspect_err(|e| log_write_failure("update_entry", owner_id, entry_id, e))?;

        log_annotated("update_entry", owner_id, entry_id, &outcome, start);
        self.fetch_entry(owner_id, entry_id).await
    }

    /// Re-scan an entry's current body and repair its associations.
    pub async fn reannotate_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<Annotations> {
        let start = Instant::now();
        let outcome = within(self.config.store_timeout, "reannotate_entry", async {
            let mut tx = self.store.begin().await?;
            let entry = tx
                .lock_entry(owner_id, entry_id)
                .await?
                .ok_or(Error::EntryNotFound(entry_id))?;
            let outcome =
                annotate_tx(tx.as_mut(), owner_id, entry_id, None, entry.body_text()).await?;
            tx.commit().await?;
            Ok(outcome)
        })
        .await
        .inspect_err(|e| log_write_failure("reannotate_entry", owner_id, entry_id, e))?;

        log_annotated("reannotate_entry", owner_id, entry_id, &outcome, start);
        Ok(outcome.annotations)
    }

    pub async fn fetch_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<EntryFull> {
        within(
            self.config.store_timeout,
            "fetch_entry",
            self.entries.fetch(owner_id, entry_id),
        )
        .await
    }

    pub async fn list_entries(
        &self,
        owner_id: Uuid,
        req: ListEntriesRequest,
    ) -> Result<ListEntriesResponse> {
        within(
            self.config.store_timeout,
            "list_entries",
            self.entries.list(owner_id, req),
        )
        .await
    }

    /// Soft-delete an entry. Its associations are kept so a restore brings
    /// them back.
    pub async fn delete_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        within(
            self.config.store_timeout,
            "delete_entry",
            self.entries.soft_delete(owner_id, entry_id),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "entry_service",
            op = "delete_entry",
            owner_id = %owner_id,
            entry_id = %entry_id,
            "Entry soft-deleted"
        );
        Ok(())
    }

    pub async fn restore_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        within(
            self.config.store_timeout,
            "restore_entry",
            self.entries.restore(owner_id, entry_id),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "entry_service",
            op = "restore_entry",
            owner_id = %owner_id,
            entry_id = %entry_id,
            "Entry restored"
        );
        Ok(())
    }

    /// Record a reference to a blob already stored in the blob store.
    pub async fn add_attachment(
        &self,
        owner_id: Uuid,
        attachment: NewAttachment,
    ) -> Result<Attachment> {
        if attachment.blob_key.trim().is_empty() {
            return Err(Error::InvalidInput("Attachment blob key is required".into()));
        }
        if attachment.file_name.trim().is_empty() {
            return Err(Error::InvalidInput("Attachment file name is required".into()));
        }
        if attachment.size_bytes < 0 {
            return Err(Error::InvalidInput(
                "Attachment size cannot be negative".into(),
            ));
        }

        let entry_id = attachment.entry_id;
        let stored = within(
            self.config.store_timeout,
            "add_attachment",
            self.entries.add_attachment(owner_id, attachment),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "entry_service",
            op = "add_attachment",
            owner_id = %owner_id,
            entry_id = %entry_id,
            attachment_id = %stored.id,
            "Attachment added"
        );
        Ok(stored)
    }

    pub async fn remove_attachment(&self, owner_id: Uuid, attachment_id: Uuid) -> Result<()> {
        within(
            self.config.store_timeout,
            "remove_attachment",
            self.entries.remove_attachment(owner_id, attachment_id),
        )
        .await?;
        debug!(
            subsystem = "annotate",
            component = "entry_service",
            op = "remove_attachment",
            owner_id = %owner_id,
            attachment_id = %attachment_id,
            "Attachment removed"
        );
        Ok(())
    }
}

/// Blank values become `None`.
fn normalize_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Apply the set fields of `req`. Returns whether anything changed.
fn apply_update(entry: &mut Entry, req: UpdateEntryRequest) -> bool {
    let mut changed = false;
    if let Some(title) = req.title {
        let title = normalize_text(Some(title.trim().to_string()));
        changed |= entry.title != title;
        entry.title = title;
    }
    if let Some(body) = req.body {
        let body = normalize_text(Some(body));
        changed |= entry.body != body;
        entry.body = body;
    }
    if let Some(starred) = req.starred {
        changed |= entry.starred != starred;
        entry.starred = starred;
    }
    if let Some(metadata) = req.metadata {
        changed |= entry.metadata.as_ref() != Some(&metadata);
        entry.metadata = Some(metadata);
    }
    changed
}

fn log_annotated(
    op: &'static str,
    owner_id: Uuid,
    entry_id: Uuid,
    outcome: &PipelineOutcome,
    start: Instant,
) {
    info!(
        subsystem = "annotate",
        component = "entry_service",
        op,
        owner_id = %owner_id,
        entry_id = %entry_id,
        skipped = outcome.skipped,
        created = outcome.stats.created,
        linked = outcome.stats.linked,
        unlinked = outcome.stats.unlinked,
        duration_ms = start.elapsed().as_millis() as u64,
        "Entry annotated"
    );
}

fn log_write_failure(op: &'static str, owner_id: Uuid, entry_id: Uuid, err: &Error) {
    if err.is_persistence() {
        warn!(
            subsystem = "annotate",
            component = "entry_service",
            op,
            owner_id = %owner_id,
            entry_id = %entry_id,
            error = %err,
            "Entry write failed, prior state kept"
        );
    }
}
