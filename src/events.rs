//! Streaming XML event interface
//!
//! This module defines the event contract consumed by the validation
//! filter and the schema compiler:
//! - `Attributes`: the ordered, unique-name attribute set of a start tag
//! - `ContentHandler`: the callback trait for start/characters/end events
//! - `XmlReader`: a pull-to-push driver over quick-xml that feeds a
//!   handler and decorates handler failures with line/column positions
//!
//! The schema compiler reuses this interface to read the schema document
//! itself, so one streaming contract covers both sides.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// Ordered set of (name, value) attribute pairs with unique names
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: IndexMap<String, String>,
}

impl Attributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute; duplicate names are an XML error
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(Error::Xml(format!("duplicate attribute '{}'", name)));
        }
        self.entries.insert(name, value.into());
        Ok(())
    }

    /// Get an attribute value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|s| s.as_str())
    }

    /// Iterate over (name, value) pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Callback interface for an ordered stream of XML content events.
///
/// Events arrive strictly in document order. Any callback may fail; the
/// driver stops at the first failure and the error terminates the parse
/// of the current document.
pub trait ContentHandler {
    /// An element start tag, with its attribute set
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        let _ = (name, attributes);
        Ok(())
    }

    /// A run of character data; consecutive runs for one element may be
    /// delivered in fragments
    fn characters(&mut self, text: &str) -> Result<()> {
        let _ = text;
        Ok(())
    }

    /// An element end tag
    fn end_element(&mut self, name: &str) -> Result<()> {
        let _ = name;
        Ok(())
    }
}

/// Compute a 1-based (line, column) pair for a byte offset into `text`
fn line_col(text: &str, byte_pos: usize) -> (u64, u64) {
    let upto = &text.as_bytes()[..byte_pos.min(text.len())];
    let line = upto.iter().filter(|&&b| b == b'\n').count() as u64 + 1;
    let column = upto
        .iter()
        .rev()
        .take_while(|&&b| b != b'\n')
        .count() as u64
        + 1;
    (line, column)
}

/// Streaming driver that reads an XML source and feeds a `ContentHandler`.
///
/// Errors returned by the handler are annotated with the line/column of
/// the event that produced them. Driving a handler directly (without the
/// reader) simply yields errors without positions.
pub struct XmlReader;

impl XmlReader {
    /// Parse an XML string, dispatching events to the handler
    pub fn parse_str(xml: &str, handler: &mut dyn ContentHandler) -> Result<()> {
        let mut reader = Reader::from_str(xml);

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::Xml(format!("error at byte {}: {}", reader.buffer_position(), e)))?;

            let result = match event {
                Event::Start(ref e) => {
                    let (name, attributes) = Self::parse_start(e)?;
                    handler.start_element(&name, &attributes)
                }
                Event::Empty(ref e) => {
                    let (name, attributes) = Self::parse_start(e)?;
                    handler
                        .start_element(&name, &attributes)
                        .and_then(|()| handler.end_element(&name))
                }
                Event::End(ref e) => {
                    let name = std::str::from_utf8(e.name().as_ref())
                        .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
                        .to_string();
                    handler.end_element(&name)
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                    handler.characters(&text)
                }
                Event::CData(e) => {
                    let text = std::str::from_utf8(&e.into_inner())
                        .map_err(|e| Error::Xml(format!("invalid CDATA: {}", e)))?
                        .to_string();
                    handler.characters(&text)
                }
                Event::Eof => break,
                // Comments, processing instructions, declarations
                _ => Ok(()),
            };

            if let Err(err) = result {
                let (line, column) = line_col(xml, reader.buffer_position());
                return Err(err.at(line, column));
            }
        }

        Ok(())
    }

    /// Parse an XML file, dispatching events to the handler
    pub fn parse_file(path: impl AsRef<Path>, handler: &mut dyn ContentHandler) -> Result<()> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|e| {
            Error::Xml(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::parse_str(&xml, handler)
    }

    /// Extract the element name and attribute set from a start tag
    fn parse_start(start: &BytesStart) -> Result<(String, Attributes)> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
            .to_string();

        let mut attributes = Attributes::new();
        for attr_result in start.attributes() {
            let attr =
                attr_result.map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?;

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?;

            attributes.insert(attr_name, attr_value.as_ref())?;
        }

        Ok((name, attributes))
    }
}
