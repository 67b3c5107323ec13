//! Persisted record layout and the per-format metadata capability set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Derived fingerprints maintained by the dedup handler.
///
/// Cleared whenever the owning source has dedup disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DedupKeys {
    pub title_keys: Vec<String>,
    pub isbn_keys: Vec<String>,
    pub id_keys: Vec<String>,
}

impl DedupKeys {
    pub fn is_empty(&self) -> bool {
        self.title_keys.is_empty() && self.isbn_keys.is_empty() && self.id_keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.title_keys.clear();
        self.isbn_keys.clear();
        self.id_keys.clear();
    }
}

/// One stored bibliographic/archival unit or split fragment.
///
/// Field names (camelCase on the wire) are the contract every storage
/// backend exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// `id_prefix + "." + local id`; immutable once created.
    pub id: String,
    pub source_id: String,
    /// Id of the first fragment of the splitter batch; unset on that fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_id: Option<String>,
    pub oai_id: String,
    pub format: String,
    #[serde(with = "text_bytes")]
    pub original_data: Vec<u8>,
    /// Empty when normalization was a no-op; read through [`Self::effective_data`].
    #[serde(with = "text_bytes")]
    pub normalized_data: Vec<u8>,
    #[serde(default)]
    pub host_record_ids: Vec<String>,
    #[serde(default)]
    pub linking_id: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_id: Option<String>,
    #[serde(default, skip_serializing_if = "DedupKeys::is_empty")]
    pub dedup_keys: DedupKeys,
    pub update_needed: bool,
    pub deleted: bool,
    #[serde(default)]
    pub mark: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub date: DateTime<Utc>,
}

impl StoredRecord {
    /// Fresh record with all timestamps set to `now`.
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        oai_id: impl Into<String>,
        format: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            main_id: None,
            oai_id: oai_id.into(),
            format: format.into(),
            original_data: Vec::new(),
            normalized_data: Vec::new(),
            host_record_ids: Vec::new(),
            linking_id: Vec::new(),
            dedup_id: None,
            dedup_keys: DedupKeys::default(),
            update_needed: false,
            deleted: false,
            mark: false,
            created: now,
            updated: now,
            date: now,
        }
    }

    /// Normalized payload, or the original one when normalization changed nothing.
    pub fn effective_data(&self) -> &[u8] {
        if self.normalized_data.is_empty() {
            &self.original_data
        } else {
            &self.normalized_data
        }
    }

    /// Store both serializations, dropping the normalized copy when identical.
    pub fn set_payload(&mut self, original: Vec<u8>, normalized: Vec<u8>) {
        self.normalized_data = if normalized == original {
            Vec::new()
        } else {
            normalized
        };
        self.original_data = original;
    }

    /// Component parts carry host ids and never their own dedup identity.
    pub fn is_component_part(&self) -> bool {
        !self.host_record_ids.is_empty()
    }
}

/// Capabilities every parsed metadata format provides to the pipeline.
pub trait MetadataRecord {
    /// Local (unprefixed) identifier; empty when the payload carries none.
    fn id(&self) -> String;

    fn suppressed(&self) -> bool {
        false
    }

    /// Ordered ids of the host records this record is a component part of.
    fn host_record_ids(&self) -> Vec<String>;

    /// Ids under which other records may reference this one as their host.
    fn linking_ids(&self) -> Vec<String>;

    fn normalize(&mut self);

    fn serialize(&self) -> Result<Vec<u8>>;

    /// Title hint for dedup candidate keys.
    fn title(&self) -> Option<String> {
        None
    }

    /// ISBN hints for dedup candidate keys.
    fn isbns(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Dedup order-preserving list of non-empty trimmed ids.
pub fn unique_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if !id.is_empty() && !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}

mod text_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}
