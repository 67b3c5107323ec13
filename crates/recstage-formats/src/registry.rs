//! Format-keyed parser factory

use recstage_core::{IngestError, MetadataRecord, RecordFactory, Result};
use rustc_hash::FxHashMap;

use crate::{dc, marc};

/// Parser entry point: raw chunk bytes in, parsed record out.
pub type ParseFn = fn(&[u8]) -> Result<Box<dyn MetadataRecord>>;

fn parse_dc(data: &[u8]) -> Result<Box<dyn MetadataRecord>> {
    Ok(Box::new(dc::DcRecord::parse(data)?))
}

fn parse_marc(data: &[u8]) -> Result<Box<dyn MetadataRecord>> {
    Ok(Box::new(marc::MarcRecord::parse(data)?))
}

/// Parsers by format name. `dc` and `marc` are built in.
pub struct FormatRegistry {
    parsers: FxHashMap<String, ParseFn>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self {
            parsers: FxHashMap::default(),
        };
        registry.register(dc::FORMAT, parse_dc);
        registry.register(marc::FORMAT, parse_marc);
        registry
    }
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the parser for `format`.
    pub fn register(&mut self, format: impl Into<String>, parse: ParseFn) {
        self.parsers.insert(format.into(), parse);
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl RecordFactory for FormatRegistry {
    fn create(
        &self,
        format: &str,
        data: &[u8],
        oai_id: &str,
        source_id: &str,
    ) -> Result<Box<dyn MetadataRecord>> {
        let parse = self.parsers.get(format).ok_or_else(|| {
            IngestError::Config(format!(
                "no parser for format '{format}' (source '{source_id}')"
            ))
        })?;
        log::trace!("parsing {} bytes as {format} (oai id '{oai_id}')", data.len());
        parse(data)
    }
}
