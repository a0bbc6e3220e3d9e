//! Error types for xsdfilter
//!
//! This module defines the three failure classes of the validator:
//! schema compilation errors, structural validation errors and
//! value (type/facet) validation errors.

use std::fmt;
use thiserror::Error;

/// Result type alias using the xsdfilter Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsdfilter operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unsupported schema construct, unresolved reference,
    /// missing schema file; raised only during compilation
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Unexpected element, missing required element or attribute,
    /// occurrence-bound violation, disallowed text
    #[error("structural error: {0}")]
    Structure(#[from] StructureError),

    /// Lexical or facet violation of a value against its simple type
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// XML parsing error from the underlying event source
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Annotate this error with a source position, if it can carry one.
    ///
    /// Used by the event reader to enrich handler failures with the
    /// line/column at which the offending event was delivered.
    pub fn at(self, line: u64, column: u64) -> Self {
        let location = format!("line {}, column {}", line, column);
        match self {
            Error::Schema(e) => Error::Schema(e.with_location(location)),
            Error::Structure(e) => Error::Structure(e.with_location(location)),
            Error::Value(e) => Error::Value(e.with_location(location)),
            other => other,
        }
    }
}

/// Schema compilation error
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Error message
    pub message: String,
    /// Location in the schema source
    pub location: Option<String>,
    /// Schema construct that caused the error
    pub construct: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            construct: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the offending construct
    pub fn with_construct(mut self, construct: impl Into<String>) -> Self {
        self.construct = Some(construct.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref construct) = self.construct {
            write!(f, " (in {})", construct)?;
        }

        if let Some(ref location) = self.location {
            write!(f, " at {}", location)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// Structural validation error
#[derive(Debug, Clone)]
pub struct StructureError {
    /// Error message
    pub message: String,
    /// Element path where validation failed
    pub path: Option<String>,
    /// Source position, when the event reader provides one
    pub location: Option<String>,
}

impl StructureError {
    /// Create a new structural error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            location: None,
        }
    }

    /// Set the element path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the source position
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        if let Some(ref location) = self.location {
            write!(f, "\n\nLocation: {}", location)?;
        }

        Ok(())
    }
}

impl std::error::Error for StructureError {}

/// Value validation error against a simple type
#[derive(Debug, Clone)]
pub struct ValueError {
    /// Error message
    pub message: String,
    /// The offending value
    pub value: Option<String>,
    /// The violated facet, when one is responsible
    pub facet: Option<String>,
    /// The simple type being validated against
    pub type_name: Option<String>,
    /// Source position, when the event reader provides one
    pub location: Option<String>,
}

impl ValueError {
    /// Create a new value error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: None,
            facet: None,
            type_name: None,
            location: None,
        }
    }

    /// Set the offending value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the violated facet
    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.facet = Some(facet.into());
        self
    }

    /// Set the type name
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the source position
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref value) = self.value {
            write!(f, "\n\nValue: '{}'", value)?;
        }

        if let Some(ref facet) = self.facet {
            write!(f, "\n\nFacet: {}", facet)?;
        }

        if let Some(ref type_name) = self.type_name {
            write!(f, "\n\nType: {}", type_name)?;
        }

        if let Some(ref location) = self.location {
            write!(f, "\n\nLocation: {}", location)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_error_display() {
        let err = StructureError::new("unexpected element 'b'")
            .with_path("/root/a")
            .with_location("line 3, column 7");

        let msg = format!("{}", err);
        assert!(msg.contains("unexpected element 'b'"));
        assert!(msg.contains("Path: /root/a"));
        assert!(msg.contains("Location:"));
    }

    #[test]
    fn test_value_error_display() {
        let err = ValueError::new("value does not satisfy facet")
            .with_value("abc")
            .with_facet("minLength")
            .with_type("foo");

        let msg = format!("{}", err);
        assert!(msg.contains("Value: 'abc'"));
        assert!(msg.contains("Facet: minLength"));
        assert!(msg.contains("Type: foo"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = StructureError::new("test").into();
        assert!(matches!(err, Error::Structure(_)));

        let err: Error = SchemaError::new("test").into();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_error_at_position() {
        let err: Error = ValueError::new("bad value").into();
        let err = err.at(12, 5);
        let msg = format!("{}", err);
        assert!(msg.contains("line 12, column 5"));
    }
}
