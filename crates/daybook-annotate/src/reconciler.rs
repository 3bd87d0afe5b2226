//! Catalog reconciliation for one entry.
//!
//! Brings an entry's tag and person associations in line with a desired set
//! of names: missing catalog rows are created, absent links are added, and
//! links no longer wanted are removed. Catalog rows are never deleted here.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use daybook_core::{
    within, Annotations, CatalogKind, CatalogRef, EngineConfig, Error, Result, StoreTx,
    TransactionalStore,
};

/// Counts of the mutations one reconciliation made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub linked: usize,
    pub unlinked: usize,
    /// Catalog inserts that lost a race and re-used the winner's row.
    pub conflicts_recovered: usize,
}

impl ReconcileStats {
    /// Whether anything was written.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.linked == 0 && self.unlinked == 0
    }
}

/// Reconciled associations and what it took to reach them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub annotations: Annotations,
    pub stats: ReconcileStats,
}

/// Reconcile both catalogs for `entry_id` inside an existing transaction.
///
/// Returned references follow the order of the desired names.
pub async fn reconcile_tx(
    tx: &mut dyn StoreTx,
    owner_id: Uuid,
    entry_id: Uuid,
    desired_tags: &[String],
    desired_people: &[String],
) -> Result<ReconcileOutcome> {
    let mut stats = ReconcileStats::default();
    let tags = reconcile_kind(
        tx,
        CatalogKind::Tag,
        owner_id,
        entry_id,
        desired_tags,
        &mut stats,
    )
    .await?;
    let people = reconcile_kind(
        tx,
        CatalogKind::Person,
        owner_id,
        entry_id,
        desired_people,
        &mut stats,
    )
    .await?;

    Ok(ReconcileOutcome {
        annotations: Annotations { tags, people },
        stats,
    })
}

async fn reconcile_kind(
    tx: &mut dyn StoreTx,
    kind: CatalogKind,
    owner_id: Uuid,
    entry_id: Uuid,
    desired: &[String],
    stats: &mut ReconcileStats,
) -> Result<Vec<CatalogRef>> {
    let current = tx.linked(kind, entry_id).await?;

    let mut seen = HashSet::new();
    let names: Vec<&str> = desired
        .iter()
        .map(String::as_str)
        .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
        .collect();

    // Resolve in case-insensitive name order so concurrent writers take
    // catalog index locks in the same sequence.
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by_cached_key(|&i| names[i].to_lowercase());
    let mut resolved: Vec<Option<CatalogRef>> = names.iter().map(|_| None).collect();
    for i in order {
        resolved[i] = Some(resolve(tx, kind, owner_id, names[i], stats).await?);
    }
    let wanted: Vec<CatalogRef> = resolved.into_iter().flatten().collect();

    let wanted_ids: HashSet<Uuid> = wanted.iter().map(|r| r.id).collect();
    for stale in current.iter().filter(|r| !wanted_ids.contains(&r.id)) {
        tx.unlink(kind, entry_id, stale.id).await?;
        stats.unlinked += 1;
    }

    let current_ids: HashSet<Uuid> = current.iter().map(|r| r.id).collect();
    for missing in wanted.iter().filter(|r| !current_ids.contains(&r.id)) {
        tx.link(kind, entry_id, missing.id).await?;
        stats.linked += 1;
    }

    Ok(wanted)
}

/// Find the owner's catalog row for `name`, creating it if absent.
///
/// A uniqueness conflict on create means a concurrent writer inserted the
/// same name first; its row is fetched and used.
async fn resolve(
    tx: &mut dyn StoreTx,
    kind: CatalogKind,
    owner_id: Uuid,
    name: &str,
    stats: &mut ReconcileStats,
) -> Result<CatalogRef> {
    if let Some(existing) = tx.find_by_name(kind, owner_id, name).await? {
        return Ok(existing);
    }

    match tx.create_catalog_row(kind, owner_id, name).await {
        Ok(created) => {
            debug!(
                subsystem = "annotate",
                component = "reconciler",
                kind = %kind,
                owner_id = %owner_id,
                name,
                "Created catalog row"
            );
            stats.created += 1;
            Ok(created)
        }
        Err(Error::Conflict(reason)) => {
            warn!(
                subsystem = "annotate",
                component = "reconciler",
                kind = %kind,
                owner_id = %owner_id,
                name,
                reason = %reason,
                "Catalog insert conflicted, re-fetching existing row"
            );
            stats.conflicts_recovered += 1;
            tx.find_by_name(kind, owner_id, name).await?.ok_or_else(|| {
                Error::Internal(format!(
                    "{} '{}' conflicted on insert but could not be re-fetched",
                    kind, name
                ))
            })
        }
        Err(e) => Err(e),
    }
}

/// Standalone reconciliation in its own transaction.
pub struct Reconciler<'a> {
    store: &'a dyn TransactionalStore,
    config: &'a EngineConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn TransactionalStore, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Reconcile an entry's associations with the desired names.
    ///
    /// All creates, links, and unlinks commit together or not at all; on
    /// failure the entry's prior associations are left unchanged.
    pub async fn reconcile(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        desired_tags: &[String],
        desired_people: &[String],
    ) -> Result<ReconcileOutcome> {
        let start = Instant::now();
        let outcome = within(self.config.store_timeout, "reconcile", async {
            let mut tx = self.store.begin().await?;
            if tx.lock_entry(owner_id, entry_id).await?.is_none() {
                return Err(Error::EntryNotFound(entry_id));
            }
            let outcome =
                reconcile_tx(tx.as_mut(), owner_id, entry_id, desired_tags, desired_people)
                    .await?;
            tx.commit().await?;
            Ok(outcome)
        })
        .await?;

        info!(
            subsystem = "annotate",
            component = "reconciler",
            op = "reconcile",
            owner_id = %owner_id,
            entry_id = %entry_id,
            created = outcome.stats.created,
            linked = outcome.stats.linked,
            unlinked = outcome.stats.unlinked,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reconciled entry associations"
        );
        Ok(outcome)
    }
}
