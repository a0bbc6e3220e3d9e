//! # xsdfilter
//!
//! Streaming XML validation against a compiled subset of W3C XML Schema.
//!
//! The crate is a pluggable filter in front of a streaming XML event
//! producer: the producer emits element-start, character-data and
//! element-end events in document order; the filter checks each event
//! against a compiled schema and raises at the first violation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use xsdfilter::{XsdFilter, XmlReader};
//!
//! // Compile the schema and build a validator
//! let mut filter = XsdFilter::from_file("order.xsd")?;
//!
//! // Drive it with a document's event stream
//! XmlReader::parse_file("order.xml", &mut filter)?;
//! filter.finish()?;
//! ```
//!
//! Compiled schemas are immutable and can be shared across concurrent
//! validation sessions, directly or through a [`cache::SchemaCache`]
//! keyed by path and modification time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod events;
pub mod filter;
pub mod names;
pub mod schema;

// Re-exports for convenience
pub use cache::SchemaCache;
pub use error::{Error, Result, SchemaError, StructureError, ValueError};
pub use events::{Attributes, ContentHandler, XmlReader};
pub use filter::XsdFilter;
pub use schema::Schema;

/// Version of the xsdfilter library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The XML Schema namespace
pub const XSD_NAMESPACE: &str = schema::builtins::XSD_NAMESPACE;
