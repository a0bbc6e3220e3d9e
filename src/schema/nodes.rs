//! Compiled definition nodes
//!
//! The compiled schema is a tree of definition nodes held in an index
//! arena: every node lives in a flat `Vec<DefNode>` and is addressed by
//! its `NodeId`. Reference nodes (`ElementRef`, `AttributeRef`) store
//! only a name that resolves through the element/attribute library —
//! a relation, never an owned copy.

use crate::error::{Result, SchemaError};
use crate::schema::occurs::Occurs;

/// Index of a definition node in the schema arena
pub type NodeId = usize;

/// Structural grouping kinds for a content model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Children in declared order
    Sequence,
    /// Exactly one alternative per group iteration
    Choice,
    /// Every declared child, in any relative order
    All,
}

/// Attribute usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrUse {
    /// May be present
    Optional,
    /// Must be present
    Required,
    /// Must not be present
    Prohibited,
}

impl AttrUse {
    /// Parse a `use` attribute value
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "optional" => Ok(AttrUse::Optional),
            "required" => Ok(AttrUse::Required),
            "prohibited" => Ok(AttrUse::Prohibited),
            _ => Err(SchemaError::new(format!(
                "invalid use value: '{}'. Must be 'optional', 'required', or 'prohibited'",
                s
            ))
            .into()),
        }
    }
}

/// The content an element definition carries
#[derive(Debug, Clone)]
pub enum ElementContent {
    /// Text-only content validated against a named simple type
    Simple(String),
    /// Structured content: a `ComplexType` node in the arena
    Complex(NodeId),
}

/// The content variants of a complex type
#[derive(Debug, Clone)]
pub enum ComplexContent {
    /// A content model: a `Model` node in the arena
    Model(NodeId),
    /// Simple text content plus attributes (xs:simpleContent)
    SimpleContent(String),
    /// Neither children nor text
    Empty,
}

/// A compiled definition node
#[derive(Debug, Clone)]
pub enum DefNode {
    /// Synthetic top of the tree; its single child is the document's
    /// root element definition
    Root {
        /// The root element definition
        element: NodeId,
    },

    /// An element declaration
    Element {
        /// Element name
        name: String,
        /// Occurrence bounds in its parent model
        occurs: Occurs,
        /// Simple or complex content
        content: ElementContent,
    },

    /// A reference to a top-level element declaration
    ElementRef {
        /// Name of the referenced element
        name: String,
        /// Occurrence bounds declared on the reference itself
        occurs: Occurs,
    },

    /// A complex type: content model or simple content, plus attributes
    ComplexType {
        /// Type name, for named top-level types
        name: Option<String>,
        /// Content variant
        content: ComplexContent,
        /// Attribute and attribute-ref nodes
        attributes: Vec<NodeId>,
    },

    /// A structural grouping with occurrence bounds
    Model {
        /// Grouping kind
        kind: ModelKind,
        /// Occurrence bounds of the group itself
        occurs: Occurs,
        /// Element, element-ref and nested model nodes
        children: Vec<NodeId>,
    },

    /// An attribute declaration
    Attribute {
        /// Attribute name
        name: String,
        /// Simple type the value validates against
        type_name: String,
        /// Usage constraint
        usage: AttrUse,
    },

    /// A reference to a top-level attribute declaration
    AttributeRef {
        /// Name of the referenced attribute
        name: String,
        /// Usage override declared on the reference, if any
        usage: Option<AttrUse>,
    },
}

impl DefNode {
    /// The name this node binds in its parent's content, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            DefNode::Element { name, .. }
            | DefNode::ElementRef { name, .. }
            | DefNode::Attribute { name, .. }
            | DefNode::AttributeRef { name, .. } => Some(name),
            DefNode::ComplexType { name, .. } => name.as_deref(),
            DefNode::Root { .. } | DefNode::Model { .. } => None,
        }
    }

    /// Occurrence bounds, for nodes that participate in a content model
    pub fn occurs(&self) -> Option<Occurs> {
        match self {
            DefNode::Element { occurs, .. }
            | DefNode::ElementRef { occurs, .. }
            | DefNode::Model { occurs, .. } => Some(*occurs),
            _ => None,
        }
    }
}
