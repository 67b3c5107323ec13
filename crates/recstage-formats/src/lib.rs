//! recstage-formats: metadata parsers, splitters and pre-transforms
//!
//! Streaming quick-xml implementations of the pipeline's pluggable
//! contracts:
//!
//! - [`dc::DcRecord`] for `oai_dc` Dublin Core, [`marc::MarcRecord`] for MARCXML
//! - [`FormatRegistry`] mapping format names to parsers
//! - [`XmlElementSplitter`] behind `xml:<local-name>` splitter names
//! - [`UnwrapOaiMetadata`] behind the `oai-unwrap` pre-transformation

pub mod dc;
pub mod marc;
pub mod registry;
pub mod splitter;
pub mod transform;
mod xml;

pub use registry::{FormatRegistry, ParseFn};
pub use splitter::{SplitterRegistry, XML_SPLITTER_PREFIX, XmlElementSplitter};
pub use transform::{OAI_UNWRAP, TransformRegistry, UnwrapOaiMetadata};
