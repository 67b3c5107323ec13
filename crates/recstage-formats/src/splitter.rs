//! Record splitters: one harvested payload in, one chunk per sub-record out

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::name::QName;
use recstage_core::{Chunks, IngestError, RecordSplitter, Result, SplitterFactory};
use rustc_hash::FxHashMap;

/// Name prefix resolving to an [`XmlElementSplitter`], e.g. `xml:record`.
pub const XML_SPLITTER_PREFIX: &str = "xml:";

/// Emits the raw bytes of every element whose local name is `element`.
///
/// Matches are not nested: an element inside a matched one travels with
/// its enclosing chunk. Chunks are byte-exact slices of the payload.
#[derive(Debug, Clone)]
pub struct XmlElementSplitter {
    element: String,
}

impl XmlElementSplitter {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
        }
    }
}

impl RecordSplitter for XmlElementSplitter {
    fn split<'a>(&'a self, payload: &'a [u8]) -> Result<Chunks<'a>> {
        Ok(Box::new(XmlChunks {
            reader: Reader::from_reader(payload),
            data: payload,
            element: self.element.as_bytes(),
            buf: Vec::new(),
            done: false,
        }))
    }
}

struct XmlChunks<'a> {
    reader: Reader<&'a [u8]>,
    data: &'a [u8],
    element: &'a [u8],
    buf: Vec<u8>,
    done: bool,
}

impl XmlChunks<'_> {
    fn next_chunk(&mut self) -> quick_xml::Result<Option<Vec<u8>>> {
        loop {
            self.buf.clear();
            let start = self.reader.buffer_position() as usize;
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == self.element => {
                    let name = e.name().as_ref().to_vec();
                    let mut skip = Vec::new();
                    self.reader.read_to_end_into(QName(&name), &mut skip)?;
                    let end = self.reader.buffer_position() as usize;
                    return Ok(Some(self.data[start..end].to_vec()));
                }
                Event::Empty(e) if e.local_name().as_ref() == self.element => {
                    let end = self.reader.buffer_position() as usize;
                    return Ok(Some(self.data[start..end].to_vec()));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl Iterator for XmlChunks<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                let element = String::from_utf8_lossy(self.element);
                Some(Err(IngestError::parse(
                    format!("{XML_SPLITTER_PREFIX}{element}"),
                    e,
                )))
            }
        }
    }
}

/// Named splitters; `xml:<local-name>` resolves without registration.
#[derive(Default)]
pub struct SplitterRegistry {
    custom: FxHashMap<String, Arc<dyn RecordSplitter>>,
}

impl SplitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, splitter: Arc<dyn RecordSplitter>) {
        self.custom.insert(name.into(), splitter);
    }
}

impl SplitterFactory for SplitterRegistry {
    fn splitter(&self, name: &str) -> Result<Arc<dyn RecordSplitter>> {
        if let Some(splitter) = self.custom.get(name) {
            return Ok(Arc::clone(splitter));
        }
        match name.strip_prefix(XML_SPLITTER_PREFIX) {
            Some(element) if !element.trim().is_empty() => {
                Ok(Arc::new(XmlElementSplitter::new(element.trim())))
            }
            _ => Err(IngestError::Config(format!("unknown record splitter '{name}'"))),
        }
    }
}
