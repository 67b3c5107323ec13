//! MARCXML records
//!
//! Streaming parse of a single `<record>` (the first one found, so a
//! `<collection>` wrapper is tolerated). Host/component links follow the
//! MARC 21 conventions: hosts are referenced from 773 $w and a record is
//! reachable through its 001, the `(003)001` form and its 035 $a values.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use recstage_core::{IngestError, MetadataRecord, Result, unique_ids};

use crate::xml::{XmlOut, attr, read_text};

pub const FORMAT: &str = "marc";

const MARC_NS: &str = "http://www.loc.gov/MARC21/slim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlField {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    pub code: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    pub tag: String,
    pub ind1: String,
    pub ind2: String,
    pub subfields: Vec<Subfield>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarcRecord {
    pub leader: String,
    pub control_fields: Vec<ControlField>,
    pub data_fields: Vec<DataField>,
}

impl MarcRecord {
    pub fn parse(data: &[u8]) -> Result<Self> {
        parse_marcxml(data)
            .map_err(|e| IngestError::parse(FORMAT, e))?
            .ok_or_else(|| IngestError::parse(FORMAT, "no complete <record> element"))
    }

    pub fn control(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.trim())
            .filter(|v| !v.is_empty())
    }

    /// Values of subfield `code` across all `tag` fields, in order.
    pub fn subfields<'a>(
        &'a self,
        tag: &'a str,
        code: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.data_fields
            .iter()
            .filter(move |f| f.tag == tag)
            .flat_map(|f| f.subfields.iter())
            .filter(move |s| s.code == code)
            .map(|s| s.value.as_str())
    }
}

/// `None` when the payload holds no `<record>` or ends inside one.
fn parse_marcxml(data: &[u8]) -> quick_xml::Result<Option<MarcRecord>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"record" => {
                return parse_record(&mut reader);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"record" => {
                return Ok(Some(MarcRecord::default()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_record(reader: &mut Reader<&[u8]>) -> quick_xml::Result<Option<MarcRecord>> {
    let mut record = MarcRecord::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"leader" => record.leader = read_text(reader)?,
                b"controlfield" => {
                    let tag = attr(&e, b"tag")?.unwrap_or_default();
                    let value = read_text(reader)?;
                    record.control_fields.push(ControlField { tag, value });
                }
                b"datafield" => {
                    let mut field = start_datafield(&e)?;
                    field.subfields = parse_subfields(reader)?;
                    record.data_fields.push(field);
                }
                _ => {
                    read_text(reader)?;
                }
            },
            Event::Empty(e) if e.local_name().as_ref() == b"datafield" => {
                record.data_fields.push(start_datafield(&e)?);
            }
            Event::End(e) if e.local_name().as_ref() == b"record" => return Ok(Some(record)),
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn start_datafield(e: &BytesStart<'_>) -> quick_xml::Result<DataField> {
    Ok(DataField {
        tag: attr(e, b"tag")?.unwrap_or_default(),
        ind1: attr(e, b"ind1")?.unwrap_or_else(|| " ".into()),
        ind2: attr(e, b"ind2")?.unwrap_or_else(|| " ".into()),
        subfields: Vec::new(),
    })
}

fn parse_subfields(reader: &mut Reader<&[u8]>) -> quick_xml::Result<Vec<Subfield>> {
    let mut subfields = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"subfield" => {
                let code = attr(&e, b"code")?.unwrap_or_default();
                let value = read_text(reader)?;
                subfields.push(Subfield { code, value });
            }
            Event::End(e) if e.local_name().as_ref() == b"datafield" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(subfields)
}

/// First whitespace-separated token of 020 $a, without hyphens.
fn isbn_token(value: &str) -> Option<String> {
    let token = value.split_whitespace().next()?;
    let isbn: String = token.chars().filter(|c| *c != '-').collect();
    (!isbn.is_empty()).then_some(isbn)
}

impl MetadataRecord for MarcRecord {
    fn id(&self) -> String {
        self.control("001").unwrap_or_default().to_string()
    }

    /// Leader/05 `d` marks a deleted record.
    fn suppressed(&self) -> bool {
        self.leader.as_bytes().get(5) == Some(&b'd')
    }

    fn host_record_ids(&self) -> Vec<String> {
        unique_ids(self.subfields("773", "w"))
    }

    fn linking_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(id) = self.control("001") {
            ids.push(id.to_string());
            if let Some(org) = self.control("003") {
                ids.push(format!("({org}){id}"));
            }
        }
        ids.extend(self.subfields("035", "a").map(str::to_string));
        unique_ids(ids)
    }

    fn normalize(&mut self) {
        for field in &mut self.control_fields {
            field.value = field.value.trim().to_string();
        }
        self.control_fields.retain(|f| !f.value.is_empty());
        for field in &mut self.data_fields {
            for sub in &mut field.subfields {
                sub.value = sub.value.trim().to_string();
            }
            field.subfields.retain(|s| !s.value.is_empty());
        }
        self.data_fields.retain(|f| !f.subfields.is_empty());
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = XmlOut::new(FORMAT);
        out.start("record", &[("xmlns", MARC_NS)])?;
        out.text_element("leader", &[], &self.leader)?;
        for field in &self.control_fields {
            out.text_element("controlfield", &[("tag", &field.tag)], &field.value)?;
        }
        for field in &self.data_fields {
            out.start(
                "datafield",
                &[("tag", &field.tag), ("ind1", &field.ind1), ("ind2", &field.ind2)],
            )?;
            for sub in &field.subfields {
                out.text_element("subfield", &[("code", &sub.code)], &sub.value)?;
            }
            out.end("datafield")?;
        }
        out.end("record")?;
        Ok(out.finish())
    }

    fn title(&self) -> Option<String> {
        let field = self.data_fields.iter().find(|f| f.tag == "245")?;
        let title: Vec<&str> = field
            .subfields
            .iter()
            .filter(|s| s.code == "a" || s.code == "b")
            .map(|s| s.value.trim().trim_end_matches(['/', ':', ';', '.', ' ']))
            .filter(|v| !v.is_empty())
            .collect();
        (!title.is_empty()).then(|| title.join(" "))
    }

    fn isbns(&self) -> Vec<String> {
        unique_ids(self.subfields("020", "a").filter_map(isbn_token))
    }
}
