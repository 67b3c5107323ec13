//! recstage-core: data model and contracts for the record staging pipeline
//!
//! Defines the persisted record layout, data source settings, the error
//! taxonomy, and the traits the pipeline consumes: record store, dedup
//! handler, per-format parser factory, splitter and pre-transform.

pub mod dedup;
pub mod error;
pub mod filter;
pub mod format;
pub mod logging;
pub mod progress;
pub mod record;
pub mod settings;
pub mod shutdown;
pub mod store;

// Re-exports for convenience
pub use dedup::DedupHandler;
pub use error::{IngestError, Result};
pub use filter::{RecordFilter, RecordPatch};
pub use format::{
    Chunks, PreTransform, RecordFactory, RecordSplitter, SplitterFactory, TransformFactory,
};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use record::{DedupKeys, MetadataRecord, StoredRecord, unique_ids};
pub use settings::{DataSourceConfig, DataSourceSettings, DataSources};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag};
pub use store::{MonotonicClock, RecordStore};
