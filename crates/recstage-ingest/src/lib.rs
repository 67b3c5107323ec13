//! recstage-ingest: the record staging pipeline
//!
//! [`IngestionPipeline`] turns harvested payloads into stored records,
//! keeps host/component hierarchies consistent across sources and stages
//! records for the external dedup matcher. [`QueueingDedupHandler`] is the
//! dedup hook used by the CLI.

pub mod dedup;
pub mod pipeline;

pub use dedup::{QueueingDedupHandler, candidate_keys};
pub use pipeline::IngestionPipeline;
