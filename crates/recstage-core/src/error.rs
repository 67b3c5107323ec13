//! Error taxonomy for the staging pipeline

/// Error from storing, deleting or propagating a harvested record.
///
/// Every variant aborts the current pipeline call; nothing is swallowed.
/// Already-persisted chunks of an aborted batch stay persisted.
#[derive(Debug)]
pub enum IngestError {
    /// Missing binding or setting (no dedup handler, unknown source, no format).
    Config(String),
    /// A parsed record has no local id and no OAI id to fall back on.
    Identification {
        source_id: String,
        oai_id: String,
        /// Last id successfully stored in the same batch.
        previous_id: Option<String>,
    },
    /// Malformed payload reported by a parser, splitter or transform.
    Parse { format: String, message: String },
    /// A record expected to exist is absent.
    NotFound(String),
    /// Storage backend failure.
    Store(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration: {msg}"),
            Self::Identification {
                source_id,
                oai_id,
                previous_id,
            } => write!(
                f,
                "no id in record from source '{source_id}' (oai id '{oai_id}'), previous stored id: {}",
                previous_id.as_deref().unwrap_or("<none>")
            ),
            Self::Parse { format, message } => write!(f, "{format}: {message}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Store(msg) => write!(f, "store: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl IngestError {
    pub fn parse(format: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Whether the failure is confined to the harvested unit being processed.
    ///
    /// Configuration and store failures will repeat for every following unit,
    /// so an importer should stop instead of moving on.
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            Self::Identification { .. } | Self::Parse { .. } | Self::NotFound(_)
        )
    }
}

/// Result alias used across the pipeline crates.
pub type Result<T> = std::result::Result<T, IngestError>;
