//! OAI Dublin Core (`oai_dc`) records

use quick_xml::Reader;
use quick_xml::events::Event;
use recstage_core::{IngestError, MetadataRecord, Result, unique_ids};

use crate::xml::{XmlOut, collapse_whitespace, read_text};

pub const FORMAT: &str = "dc";

const OAI_DC_NS: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

/// One `prefix:element` value, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcField {
    /// Qualified name; unprefixed elements are filed under `dc:`.
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DcRecord {
    pub fields: Vec<DcField>,
}

impl DcRecord {
    /// Parse the first element of `data` as a Dublin Core container.
    pub fn parse(data: &[u8]) -> Result<Self> {
        parse_dc(data)
            .map_err(|e| IngestError::parse(FORMAT, e))?
            .ok_or_else(|| IngestError::parse(FORMAT, "no complete root element"))
    }

    pub fn values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_string();
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| f.value.as_str())
    }

    fn first(&self, name: &str) -> Option<&str> {
        self.values(name).map(str::trim).find(|v| !v.is_empty())
    }
}

/// `None` when there is no root element or the payload ends inside it.
fn parse_dc(data: &[u8]) -> quick_xml::Result<Option<DcRecord>> {
    let mut reader = Reader::from_reader(data);
    let mut record = DcRecord::default();
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    let name = qualified_name(e.name().as_ref());
                    let value = read_text(&mut reader)?;
                    record.fields.push(DcField { name, value });
                    depth -= 1;
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    return Ok(Some(record));
                }
                if depth == 1 {
                    record.fields.push(DcField {
                        name: qualified_name(e.name().as_ref()),
                        value: String::new(),
                    });
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(Some(record));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn qualified_name(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    if raw.contains(':') {
        raw.into_owned()
    } else {
        format!("dc:{raw}")
    }
}

/// Strip the usual ISBN spellings found in `dc:identifier`.
fn isbn_of(identifier: &str) -> Option<String> {
    let lower = identifier.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("urn:isbn:")
        .or_else(|| lower.strip_prefix("isbn:"))
        .or_else(|| lower.strip_prefix("isbn "))?;
    let digits: String = rest
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x')
        .collect();
    (!digits.is_empty()).then(|| digits.to_ascii_uppercase())
}

impl MetadataRecord for DcRecord {
    fn id(&self) -> String {
        self.first("dc:identifier").unwrap_or_default().to_string()
    }

    fn host_record_ids(&self) -> Vec<String> {
        unique_ids(self.values("dcterms:isPartOf"))
    }

    fn linking_ids(&self) -> Vec<String> {
        unique_ids([self.id()])
    }

    fn normalize(&mut self) {
        for field in &mut self.fields {
            field.value = collapse_whitespace(&field.value).into_owned();
        }
        self.fields.retain(|f| !f.value.is_empty());
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = XmlOut::new(FORMAT);
        out.start(
            "oai_dc:dc",
            &[
                ("xmlns:oai_dc", OAI_DC_NS),
                ("xmlns:dc", DC_NS),
                ("xmlns:dcterms", DCTERMS_NS),
            ],
        )?;
        for field in &self.fields {
            out.text_element(&field.name, &[], &field.value)?;
        }
        out.end("oai_dc:dc")?;
        Ok(out.finish())
    }

    fn title(&self) -> Option<String> {
        self.first("dc:title").map(str::to_string)
    }

    fn isbns(&self) -> Vec<String> {
        unique_ids(self.values("dc:identifier").filter_map(isbn_of))
    }
}
