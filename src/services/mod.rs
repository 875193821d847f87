//! Service layer for mediatrack pipeline logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services report progress through return values and event channels so
//! the CLI or any other interface can present them.

pub mod backfill;
pub mod batch;
pub mod dedup;
pub mod enrichment;
pub mod ingest;
pub mod reconcile;
pub mod retry;

pub use backfill::{backfill_content, BackfillReport};
pub use batch::{insert_manual, parse_batch, ManualArticle, ParsedBatch};
pub use dedup::{check_existing, DedupReport};
pub use enrichment::{EnrichmentReport, EnrichmentService, StepResult};
pub use ingest::{IngestEvent, IngestOutcome, IngestService, ProcessReport};
pub use reconcile::{reconcile, ReconcileOptions, ReconcileReport};
pub use retry::RetryPolicy;
