//! Entry annotation pipeline: scan the body, then reconcile the catalogs.
//!
//! Runs inside the caller's write transaction so content and annotations
//! become visible together.

use tracing::{debug, trace};
use uuid::Uuid;

use daybook_core::{Annotations, CatalogKind, Result, StoreTx};

use crate::reconciler::{reconcile_tx, ReconcileStats};
use crate::scanner::scan;

/// Result of annotating one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutcome {
    /// Associations after the pipeline ran, sorted by name.
    pub annotations: Annotations,
    /// The body was unchanged, so scanning and reconciliation were skipped.
    pub skipped: bool,
    pub stats: ReconcileStats,
}

/// Annotate an entry whose body is being set to `body`.
///
/// `previous` is the body before this write, or `None` for a new entry or a
/// forced re-scan. When it is byte-identical to `body` the current
/// associations are returned without scanning.
pub async fn annotate_tx(
    tx: &mut dyn StoreTx,
    owner_id: Uuid,
    entry_id: Uuid,
    previous: Option<&str>,
    body: &str,
) -> Result<PipelineOutcome> {
    if previous == Some(body) {
        debug!(
            subsystem = "annotate",
            component = "pipeline",
            entry_id = %entry_id,
            "Body unchanged, skipping annotation"
        );
        let annotations = Annotations {
            tags: tx.linked(CatalogKind::Tag, entry_id).await?,
            people: tx.linked(CatalogKind::Person, entry_id).await?,
        };
        return Ok(PipelineOutcome {
            annotations: annotations.sorted(),
            skipped: true,
            stats: ReconcileStats::default(),
        });
    }

    let scanned = scan(body);
    trace!(
        subsystem = "annotate",
        component = "pipeline",
        entry_id = %entry_id,
        tokens = scanned.tokens.len(),
        tag_count = scanned.tags.len(),
        person_count = scanned.people.len(),
        "Scanned entry body"
    );

    let outcome = reconcile_tx(tx, owner_id, entry_id, &scanned.tags, &scanned.people).await?;
    debug!(
        subsystem = "annotate",
        component = "pipeline",
        entry_id = %entry_id,
        created = outcome.stats.created,
        linked = outcome.stats.linked,
        unlinked = outcome.stats.unlinked,
        "Annotations reconciled"
    );

    Ok(PipelineOutcome {
        annotations: outcome.annotations.sorted(),
        skipped: false,
        stats: outcome.stats,
    })
}
