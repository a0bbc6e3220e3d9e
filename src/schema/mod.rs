//! Compiled schema representation
//!
//! A `Schema` is the fully resolved, immutable form of a schema source:
//! the definition-node arena, the element/attribute libraries, and the
//! type library. It is built once by the compiler and shared (behind an
//! `Arc`, possibly through the cache) across any number of validation
//! sessions; all transient match state lives in the sessions.

pub mod builtins;
pub mod compiler;
pub mod facets;
pub mod model;
pub mod nodes;
pub mod occurs;
pub mod types;

pub use facets::{FacetSet, WhiteSpace};
pub use nodes::{AttrUse, ComplexContent, DefNode, ElementContent, ModelKind, NodeId};
pub use occurs::Occurs;
pub use types::TypeLibrary;

use crate::error::{Result, SchemaError};
use crate::events::XmlReader;
use compiler::SchemaCompiler;
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// A compiled, immutable schema
#[derive(Debug)]
pub struct Schema {
    /// Definition-node arena; `NodeId` indexes into it
    pub(crate) nodes: Vec<DefNode>,
    /// The synthetic root node
    pub(crate) root: NodeId,
    /// Element library: top-level element declarations by name
    pub(crate) elements: IndexMap<String, NodeId>,
    /// Attribute library: top-level attribute declarations by name
    pub(crate) attributes: IndexMap<String, NodeId>,
    /// Named complex types
    pub(crate) complex_types: IndexMap<String, NodeId>,
    /// Named simple types, built-ins included
    pub(crate) types: TypeLibrary,
}

impl Schema {
    /// Compile a schema from a file path.
    ///
    /// Fails with a `SchemaError` if the file does not exist or the
    /// schema does not compile.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            SchemaError::new(format!("cannot read schema file '{}': {}", path.display(), e))
        })?;
        Self::from_string(&source)
    }

    /// Compile a schema from an XML string
    pub fn from_string(source: &str) -> Result<Self> {
        let mut compiler = SchemaCompiler::new();
        XmlReader::parse_str(source, &mut compiler)?;
        compiler.finish()
    }

    /// The node behind an id
    pub fn node(&self, id: NodeId) -> &DefNode {
        &self.nodes[id]
    }

    /// The synthetic root node id
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The type library
    pub fn types(&self) -> &TypeLibrary {
        &self.types
    }

    /// Look up a top-level element declaration by name
    pub(crate) fn top_level_element(&self, name: &str) -> Option<NodeId> {
        self.elements.get(name).copied()
    }

    /// Resolve a node that may be an element reference to the element
    /// definition it names, through the element library
    pub(crate) fn resolve_element(&self, id: NodeId) -> Result<NodeId> {
        match self.node(id) {
            DefNode::ElementRef { name, .. } => {
                self.elements.get(name).copied().ok_or_else(|| {
                    SchemaError::new(format!("unresolved element reference '{}'", name)).into()
                })
            }
            _ => Ok(id),
        }
    }

    /// Resolve a node that may be an attribute reference, yielding the
    /// attribute definition and the effective usage
    pub(crate) fn resolve_attribute(&self, id: NodeId) -> Result<(NodeId, AttrUse)> {
        match self.node(id) {
            DefNode::AttributeRef { name, usage } => {
                let target = self.attributes.get(name).copied().ok_or_else(|| {
                    SchemaError::new(format!("unresolved attribute reference '{}'", name))
                })?;
                let declared = match self.node(target) {
                    DefNode::Attribute { usage, .. } => *usage,
                    _ => AttrUse::Optional,
                };
                Ok((target, usage.unwrap_or(declared)))
            }
            DefNode::Attribute { usage, .. } => Ok((id, *usage)),
            _ => Err(SchemaError::new("node is not an attribute").into()),
        }
    }

    /// Find the element definition for a child name within a model,
    /// descending through nested groups and resolving references
    pub(crate) fn find_element_in_model(&self, model: NodeId, name: &str) -> Option<NodeId> {
        let DefNode::Model { children, .. } = self.node(model) else {
            return None;
        };

        for &child in children {
            match self.node(child) {
                DefNode::Element { name: n, .. } if n == name => return Some(child),
                DefNode::ElementRef { name: n, .. } if n == name => {
                    return self.elements.get(name).copied();
                }
                DefNode::Model { .. } => {
                    if let Some(found) = self.find_element_in_model(child, name) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }

        None
    }
}
