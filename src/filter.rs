//! Validation filter
//!
//! `XsdFilter` is the streaming validator: a `ContentHandler` that
//! checks every event against the compiled schema and forwards it to an
//! optional downstream handler, so it composes in front of another
//! consumer of the same stream.
//!
//! The filter keeps a stack of frames mirroring the open-element stack
//! of the document, bottom frame standing for the synthetic root. All
//! transient match state (observed child names, buffered text) lives in
//! the frames, never on the shared schema tree — one compiled schema
//! can drive any number of concurrent sessions.
//!
//! Validation is fail-fast and single-shot: the first violation aborts
//! the pass, and the filter refuses further events.

use crate::cache::SchemaCache;
use crate::error::{Result, StructureError};
use crate::events::{Attributes, ContentHandler};
use crate::names::local_name;
use crate::schema::{AttrUse, ComplexContent, DefNode, ElementContent, NodeId, Schema};
use std::path::Path;
use std::sync::Arc;

/// One open element during validation
#[derive(Debug)]
struct Frame {
    /// The resolved definition node (Root for the bottom frame)
    node: NodeId,
    /// Display name, for error paths
    name: String,
    /// Ordered child names observed so far
    memory: Vec<String>,
    /// Concatenated character runs
    text: String,
}

/// Streaming validator over a compiled schema
pub struct XsdFilter {
    schema: Arc<Schema>,
    stack: Vec<Frame>,
    downstream: Option<Box<dyn ContentHandler>>,
    debug: bool,
    poisoned: bool,
}

impl XsdFilter {
    /// Create a validator over a compiled schema
    pub fn new(schema: Arc<Schema>) -> Self {
        let root = schema.root();
        Self {
            schema,
            stack: vec![Frame {
                node: root,
                name: String::new(),
                memory: Vec::new(),
                text: String::new(),
            }],
            downstream: None,
            debug: false,
            poisoned: false,
        }
    }

    /// Compile the schema at `path` and build a validator over it.
    ///
    /// Fails fast if the path does not exist or the schema does not
    /// compile.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(Schema::from_file(path)?)))
    }

    /// Build a validator over the cached compilation of `path`,
    /// compiling into the cache on a miss or a stale entry
    pub fn from_file_cached(path: impl AsRef<Path>, cache: &mut SchemaCache) -> Result<Self> {
        Ok(Self::new(cache.load(path)?))
    }

    /// Chain a downstream handler; every event is forwarded to it after
    /// this filter's own checks
    pub fn with_downstream(mut self, downstream: Box<dyn ContentHandler>) -> Self {
        self.downstream = Some(downstream);
        self
    }

    /// Enable diagnostic tracing of the element stack and attributes
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The compiled schema this validator runs against
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Check that the document closed cleanly: the root element was seen
    /// and every open element has ended
    pub fn finish(&self) -> Result<()> {
        if self.poisoned {
            return Err(StructureError::new("validation already failed").into());
        }
        if self.stack.len() != 1 {
            return Err(StructureError::new("document ended with open elements")
                .with_path(self.path())
                .into());
        }
        if self.stack[0].memory.is_empty() {
            return Err(StructureError::new("document has no root element").into());
        }
        Ok(())
    }

    /// Element path of the current stack, for error context
    fn path(&self) -> String {
        let mut path = String::new();
        for frame in self.stack.iter().skip(1) {
            path.push('/');
            path.push_str(&frame.name);
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }

    /// Resolve the admissible daughter definition for `name` under the
    /// top-of-stack frame
    fn resolve_daughter(&self, name: &str) -> Result<NodeId> {
        let parent = self.stack.last().expect("stack holds at least the root");

        match self.schema.node(parent.node) {
            DefNode::Root { .. } => {
                // The document root may be any top-level element
                if parent.memory.is_empty() {
                    if let Some(id) = self.schema.top_level_element(name) {
                        return Ok(id);
                    }
                }
                Err(StructureError::new(format!(
                    "unexpected element '{}': not a declared document root",
                    name
                ))
                .with_path(self.path())
                .into())
            }

            DefNode::Element { content, .. } => match content {
                ElementContent::Complex(ct) => {
                    let model = match self.schema.node(*ct) {
                        DefNode::ComplexType {
                            content: ComplexContent::Model(model),
                            ..
                        } => Some(*model),
                        _ => None,
                    };

                    let admitted = model
                        .map(|m| self.schema.model_admits(m, &parent.memory, name))
                        .unwrap_or(false);
                    if !admitted {
                        return Err(StructureError::new(format!(
                            "unexpected element '{}'",
                            name
                        ))
                        .with_path(self.path())
                        .into());
                    }

                    let model = model.expect("admission implies a content model");
                    self.schema
                        .find_element_in_model(model, name)
                        .ok_or_else(|| {
                            StructureError::new(format!("unexpected element '{}'", name))
                                .with_path(self.path())
                                .into()
                        })
                        .and_then(|id| self.schema.resolve_element(id))
                }
                ElementContent::Simple(_) => Err(StructureError::new(format!(
                    "unexpected element '{}' in simple content",
                    name
                ))
                .with_path(self.path())
                .into()),
            },

            _ => Err(StructureError::new(format!("unexpected element '{}'", name))
                .with_path(self.path())
                .into()),
        }
    }

    /// The attribute set declared for an element definition
    fn declared_attributes(&self, element: NodeId) -> &[NodeId] {
        if let DefNode::Element {
            content: ElementContent::Complex(ct),
            ..
        } = self.schema.node(element)
        {
            if let DefNode::ComplexType { attributes, .. } = self.schema.node(*ct) {
                return attributes;
            }
        }
        &[]
    }

    /// Validate a start tag's attributes against the daughter's declared
    /// set: required present, prohibited and undeclared absent, every
    /// present value lexically valid for its type
    fn check_attributes(&self, element: NodeId, attributes: &Attributes) -> Result<()> {
        let declared = self.declared_attributes(element);

        for &id in declared {
            let (target, usage) = self.schema.resolve_attribute(id)?;
            let DefNode::Attribute { name, type_name, .. } = self.schema.node(target) else {
                continue;
            };

            match (usage, attributes.get(name)) {
                (AttrUse::Required, None) => {
                    return Err(StructureError::new(format!(
                        "missing required attribute '{}'",
                        name
                    ))
                    .with_path(self.path())
                    .into())
                }
                (AttrUse::Prohibited, Some(_)) => {
                    return Err(StructureError::new(format!(
                        "prohibited attribute '{}' is present",
                        name
                    ))
                    .with_path(self.path())
                    .into())
                }
                (_, Some(value)) => self.schema.types().validate(type_name, value)?,
                (_, None) => {}
            }
        }

        // Closed attribute set: anything present but undeclared is an
        // error; namespace declarations and xml:* are carrier syntax
        for (attr_name, _) in attributes.iter() {
            if attr_name == "xmlns"
                || attr_name.starts_with("xmlns:")
                || attr_name.starts_with("xml:")
            {
                continue;
            }
            let known = declared.iter().any(|&id| {
                self.schema
                    .resolve_attribute(id)
                    .ok()
                    .and_then(|(target, _)| self.schema.node(target).name().map(|n| n == attr_name))
                    .unwrap_or(false)
            });
            if !known {
                return Err(StructureError::new(format!(
                    "undeclared attribute '{}'",
                    attr_name
                ))
                .with_path(self.path())
                .into());
            }
        }

        Ok(())
    }

    /// The simple type an element's text content validates against,
    /// if it has one
    fn simple_type_of(&self, element: NodeId) -> Option<&str> {
        match self.schema.node(element) {
            DefNode::Element {
                content: ElementContent::Simple(type_name),
                ..
            } => Some(type_name),
            DefNode::Element {
                content: ElementContent::Complex(ct),
                ..
            } => match self.schema.node(*ct) {
                DefNode::ComplexType {
                    content: ComplexContent::SimpleContent(type_name),
                    ..
                } => Some(type_name),
                _ => None,
            },
            _ => None,
        }
    }

    /// The content model an element owns, if any
    fn model_of(&self, element: NodeId) -> Option<NodeId> {
        match self.schema.node(element) {
            DefNode::Element {
                content: ElementContent::Complex(ct),
                ..
            } => match self.schema.node(*ct) {
                DefNode::ComplexType {
                    content: ComplexContent::Model(model),
                    ..
                } => Some(*model),
                _ => None,
            },
            _ => None,
        }
    }

    fn handle_start(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        let tag = local_name(name).to_string();

        let daughter = self.resolve_daughter(&tag)?;
        self.check_attributes(daughter, attributes)?;

        if self.debug {
            let attrs: Vec<String> = attributes
                .iter()
                .map(|(k, v)| format!("{}='{}'", k, v))
                .collect();
            tracing::debug!(
                element = %tag,
                depth = self.stack.len(),
                attributes = %attrs.join(" "),
                "element start"
            );
        }

        let parent = self.stack.last_mut().expect("stack holds at least the root");
        parent.memory.push(tag.clone());

        self.stack.push(Frame {
            node: daughter,
            name: tag,
            memory: Vec::new(),
            text: String::new(),
        });

        Ok(())
    }

    fn handle_characters(&mut self, text: &str) -> Result<()> {
        let frame = self.stack.last_mut().expect("stack holds at least the root");

        if matches!(self.schema.node(frame.node), DefNode::Root { .. }) {
            // Whitespace between the prolog and the root element
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(StructureError::new("text outside the document element").into());
        }

        frame.text.push_str(text);
        Ok(())
    }

    fn handle_end(&mut self, name: &str) -> Result<()> {
        let tag = local_name(name);

        if self.stack.len() < 2 {
            return Err(StructureError::new(format!("unbalanced end of '{}'", tag)).into());
        }

        let frame = self.stack.last().expect("checked above");
        if frame.name != tag {
            return Err(StructureError::new(format!(
                "mismatched end: expected '{}', got '{}'",
                frame.name, tag
            ))
            .with_path(self.path())
            .into());
        }

        if let Some(type_name) = self.simple_type_of(frame.node) {
            // Absent character data validates as the empty string, for
            // types that legally accept zero-length content
            self.schema.types().validate(type_name, &frame.text)?;
        } else {
            if !frame.text.trim().is_empty() {
                return Err(StructureError::new(format!(
                    "text content is not allowed in element '{}'",
                    frame.name
                ))
                .with_path(self.path())
                .into());
            }
            if let Some(model) = self.model_of(frame.node) {
                self.schema.model_finalize(model, &frame.memory).map_err(|e| {
                    match e {
                        crate::error::Error::Structure(se) => {
                            crate::error::Error::Structure(se.with_path(self.path()))
                        }
                        other => other,
                    }
                })?;
            } else if !frame.memory.is_empty() {
                return Err(StructureError::new(format!(
                    "element '{}' does not allow children",
                    frame.name
                ))
                .with_path(self.path())
                .into());
            }
        }

        if self.debug {
            tracing::debug!(element = %tag, depth = self.stack.len() - 1, "element end");
        }

        // Frame teardown clears the transient match state
        self.stack.pop();
        Ok(())
    }

    /// Record a failure so that subsequent events are refused
    fn poison<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            Err(StructureError::new("validation aborted by a previous error").into())
        } else {
            Ok(())
        }
    }
}

impl ContentHandler for XsdFilter {
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.check_poisoned()?;
        let result = self.handle_start(name, attributes);
        self.poison(result)?;

        if let Some(downstream) = self.downstream.as_mut() {
            downstream.start_element(name, attributes)?;
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.check_poisoned()?;
        let result = self.handle_characters(text);
        self.poison(result)?;

        if let Some(downstream) = self.downstream.as_mut() {
            downstream.characters(text)?;
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.check_poisoned()?;
        let result = self.handle_end(name);
        self.poison(result)?;

        if let Some(downstream) = self.downstream.as_mut() {
            downstream.end_element(name)?;
        }
        Ok(())
    }
}
