//! Pre-parse transformations applied to each chunk

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::name::QName;
use recstage_core::{IngestError, PreTransform, Result, TransformFactory};
use rustc_hash::FxHashMap;

pub const OAI_UNWRAP: &str = "oai-unwrap";

/// Strips an OAI-PMH `<record><header/><metadata>…</metadata></record>`
/// envelope down to the metadata element.
///
/// Payloads without a `metadata` element pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapOaiMetadata;

impl PreTransform for UnwrapOaiMetadata {
    fn transform(&self, data: &[u8]) -> Result<Vec<u8>> {
        match metadata_span(data).map_err(|e| IngestError::parse(OAI_UNWRAP, e))? {
            Unwrapped::Span(start, end) => Ok(data[start..end].to_vec()),
            Unwrapped::NoEnvelope => Ok(data.to_vec()),
            Unwrapped::Empty => Err(IngestError::parse(OAI_UNWRAP, "empty metadata element")),
        }
    }
}

enum Unwrapped {
    Span(usize, usize),
    NoEnvelope,
    Empty,
}

fn metadata_span(data: &[u8]) -> quick_xml::Result<Unwrapped> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut in_metadata = false;

    loop {
        buf.clear();
        let start = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if in_metadata => {
                let name = e.name().as_ref().to_vec();
                let mut skip = Vec::new();
                reader.read_to_end_into(QName(&name), &mut skip)?;
                return Ok(Unwrapped::Span(start, reader.buffer_position() as usize));
            }
            Event::Empty(_) if in_metadata => {
                return Ok(Unwrapped::Span(start, reader.buffer_position() as usize));
            }
            Event::End(_) if in_metadata => return Ok(Unwrapped::Empty),
            Event::Start(e) if e.local_name().as_ref() == b"metadata" => in_metadata = true,
            Event::Empty(e) if e.local_name().as_ref() == b"metadata" => {
                return Ok(Unwrapped::Empty);
            }
            Event::Eof => return Ok(Unwrapped::NoEnvelope),
            _ => {}
        }
    }
}

/// Named pre-transformations; `oai-unwrap` is always available.
#[derive(Default)]
pub struct TransformRegistry {
    custom: FxHashMap<String, Arc<dyn PreTransform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, transform: Arc<dyn PreTransform>) {
        self.custom.insert(name.into(), transform);
    }
}

impl TransformFactory for TransformRegistry {
    fn transform(&self, name: &str) -> Result<Arc<dyn PreTransform>> {
        if let Some(transform) = self.custom.get(name) {
            return Ok(Arc::clone(transform));
        }
        match name {
            OAI_UNWRAP => Ok(Arc::new(UnwrapOaiMetadata)),
            _ => Err(IngestError::Config(format!(
                "unknown pre-transformation '{name}'"
            ))),
        }
    }
}
