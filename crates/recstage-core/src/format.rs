//! Pluggable parser, splitter and pre-transform contracts

use std::sync::Arc;

use crate::error::Result;
use crate::record::MetadataRecord;

/// Format-keyed parser factory.
pub trait RecordFactory: Send + Sync {
    /// Parse `data` as `format`. Malformed payloads yield `IngestError::Parse`.
    fn create(
        &self,
        format: &str,
        data: &[u8],
        oai_id: &str,
        source_id: &str,
    ) -> Result<Box<dyn MetadataRecord>>;
}

/// Lazy, finite, ordered sequence of raw record chunks.
pub type Chunks<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// Breaks one harvested payload into one chunk per logical sub-record.
pub trait RecordSplitter: Send + Sync {
    fn split<'a>(&'a self, payload: &'a [u8]) -> Result<Chunks<'a>>;
}

/// Resolves splitter names from source settings.
pub trait SplitterFactory: Send + Sync {
    fn splitter(&self, name: &str) -> Result<Arc<dyn RecordSplitter>>;
}

/// Rewrites a raw chunk before it reaches the parser.
pub trait PreTransform: Send + Sync {
    fn transform(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Resolves pre-transformation names from source settings.
pub trait TransformFactory: Send + Sync {
    fn transform(&self, name: &str) -> Result<Arc<dyn PreTransform>>;
}
