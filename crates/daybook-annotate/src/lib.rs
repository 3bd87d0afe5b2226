//! # daybook-annotate
//!
//! The entry write path for daybook: extracting `#tag` and `@person`
//! references from entry bodies and keeping each owner's catalogs and entry
//! associations in step with them.
//!
//! - [`scanner`] finds references in markdown text
//! - [`reconciler`] creates, links, and unlinks catalog rows for one entry
//! - [`pipeline`] runs both inside the caller's write transaction
//! - [`service`] and [`catalog`] are the request-facing services

pub mod catalog;
pub mod pipeline;
pub mod reconciler;
pub mod scanner;
pub mod service;

pub use catalog::CatalogService;
pub use pipeline::{annotate_tx, PipelineOutcome};
pub use reconciler::{reconcile_tx, ReconcileOutcome, ReconcileStats, Reconciler};
pub use scanner::{scan, ReferenceToken, ScanResult};
pub use service::EntryService;
