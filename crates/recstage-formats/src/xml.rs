//! quick-xml helpers shared by the format parsers

use std::borrow::Cow;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use recstage_core::{IngestError, Result};

/// Concatenated text of the current element, including nested elements.
///
/// Call right after the element's `Start` event; consumes through its `End`.
pub(crate) fn read_text(reader: &mut Reader<&[u8]>) -> quick_xml::Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::Start(_) => text.push_str(&read_text(reader)?),
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Unescaped value of attribute `name`, if present.
pub(crate) fn attr(e: &BytesStart<'_>, name: &[u8]) -> quick_xml::Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let collapsed: Vec<&str> = s.split_whitespace().collect();
    let joined = collapsed.join(" ");
    if joined == s {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(joined)
    }
}

/// Serializer producing canonical (no indentation, no declaration) XML.
pub(crate) struct XmlOut {
    writer: Writer<Vec<u8>>,
    format: &'static str,
}

impl XmlOut {
    pub(crate) fn new(format: &'static str) -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            format,
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| IngestError::parse(self.format, e))
    }

    pub(crate) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.emit(Event::Start(start))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    /// `<name attrs>text</name>`
    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<()> {
        self.start(name, attrs)?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}
