//! Schema compiler
//!
//! Builds the compiled tree from a schema document delivered through the
//! same streaming `ContentHandler` interface the validator consumes —
//! the compiler is itself a handler driven by `XmlReader`.
//!
//! Compilation is single-pass and order-dependent: every `type`, `ref`
//! and `base` name is resolved against the libraries at the point of
//! use, so forward references fail. Unsupported schema elements are a
//! compile-time failure; unsupported attributes on supported elements
//! are ignored.

use crate::error::{Result, SchemaError};
use crate::events::{Attributes, ContentHandler};
use crate::names::local_name;
use crate::schema::facets::{FacetSet, PatternFacet, WhiteSpace};
use crate::schema::nodes::{
    AttrUse, ComplexContent, DefNode, ElementContent, ModelKind, NodeId,
};
use crate::schema::occurs::{parse_occurs, Occurs};
use crate::schema::types::TypeLibrary;
use crate::schema::Schema;
use indexmap::IndexMap;

/// A partially built construct on the compiler stack
#[derive(Debug)]
enum Construct {
    Schema,
    Element(PendingElement),
    ComplexType(PendingComplexType),
    SimpleType(PendingSimpleType),
    SimpleContent { base: Option<String> },
    Restriction { base: String, facets: FacetSet },
    Extension { base: String },
    Model(PendingModel),
    Attribute(PendingAttribute),
    Facet,
}

#[derive(Debug)]
struct PendingElement {
    name: Option<String>,
    ref_name: Option<String>,
    type_attr: Option<String>,
    occurs: Occurs,
    inline: Option<ElementContent>,
}

#[derive(Debug, Default)]
struct PendingComplexType {
    name: Option<String>,
    model: Option<NodeId>,
    simple_content: Option<String>,
    attributes: Vec<NodeId>,
}

#[derive(Debug)]
struct PendingSimpleType {
    name: Option<String>,
    base: Option<String>,
    facets: FacetSet,
}

#[derive(Debug)]
struct PendingModel {
    kind: ModelKind,
    occurs: Occurs,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct PendingAttribute {
    name: Option<String>,
    ref_name: Option<String>,
    type_attr: Option<String>,
    usage: Option<AttrUse>,
}

/// Streaming schema compiler; feed it the schema document's events, then
/// call `finish` to obtain the compiled `Schema`
#[derive(Debug)]
pub struct SchemaCompiler {
    nodes: Vec<DefNode>,
    elements: IndexMap<String, NodeId>,
    attributes: IndexMap<String, NodeId>,
    complex_types: IndexMap<String, NodeId>,
    types: TypeLibrary,
    stack: Vec<Construct>,
    root_element: Option<NodeId>,
    seen_schema: bool,
    skip_depth: u32,
    anon_counter: u32,
}

impl SchemaCompiler {
    /// Create a compiler with an empty tree and the built-in types
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            elements: IndexMap::new(),
            attributes: IndexMap::new(),
            complex_types: IndexMap::new(),
            types: TypeLibrary::with_builtins(),
            stack: Vec::new(),
            root_element: None,
            seen_schema: false,
            skip_depth: 0,
            anon_counter: 0,
        }
    }

    /// Finalize compilation into a `Schema`
    pub fn finish(mut self) -> Result<Schema> {
        if !self.seen_schema {
            return Err(SchemaError::new("document is not a schema: no schema element").into());
        }
        if !self.stack.is_empty() {
            return Err(SchemaError::new("schema document ended with open constructs").into());
        }
        let root_element = self
            .root_element
            .ok_or_else(|| SchemaError::new("schema declares no top-level element"))?;

        let root = self.push(DefNode::Root { element: root_element });

        Ok(Schema {
            nodes: self.nodes,
            root,
            elements: self.elements,
            attributes: self.attributes,
            complex_types: self.complex_types,
            types: self.types,
        })
    }

    fn push(&mut self, node: DefNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn fresh_anon_name(&mut self) -> String {
        self.anon_counter += 1;
        // '#' cannot appear in an NCName, so these never collide with
        // user-declared type names
        format!("#anonymous{}", self.anon_counter)
    }

    /// Resolve a type attribute value to element content
    fn resolve_type(&self, type_attr: &str) -> Result<ElementContent> {
        let name = local_name(type_attr);
        if self.types.contains(name) {
            Ok(ElementContent::Simple(name.to_string()))
        } else if let Some(&id) = self.complex_types.get(name) {
            Ok(ElementContent::Complex(id))
        } else {
            Err(SchemaError::new(format!("unresolved type '{}'", name)).into())
        }
    }

    /// Resolve a base attribute value to a registered simple type name
    fn resolve_simple_base(&self, base_attr: &str) -> Result<String> {
        let name = local_name(base_attr);
        if self.types.contains(name) {
            Ok(name.to_string())
        } else {
            Err(SchemaError::new(format!("unresolved base type '{}'", name)).into())
        }
    }

    fn start_construct(&mut self, tag: &str, attributes: &Attributes) -> Result<()> {
        match tag {
            "schema" => {
                if self.seen_schema || !self.stack.is_empty() {
                    return Err(SchemaError::new("misplaced schema element").into());
                }
                self.seen_schema = true;
                self.stack.push(Construct::Schema);
            }

            "element" => {
                match self.stack.last() {
                    Some(Construct::Schema) | Some(Construct::Model(_)) => {}
                    _ => {
                        return Err(SchemaError::new("element declaration not allowed here")
                            .with_construct("element")
                            .into())
                    }
                }
                let occurs =
                    parse_occurs(attributes.get("minOccurs"), attributes.get("maxOccurs"))?;
                self.stack.push(Construct::Element(PendingElement {
                    name: attributes.get("name").map(String::from),
                    ref_name: attributes.get("ref").map(|r| local_name(r).to_string()),
                    type_attr: attributes.get("type").map(String::from),
                    occurs,
                    inline: None,
                }));
            }

            "complexType" => {
                match self.stack.last() {
                    Some(Construct::Schema) | Some(Construct::Element(_)) => {}
                    _ => {
                        return Err(SchemaError::new("complexType not allowed here")
                            .with_construct("complexType")
                            .into())
                    }
                }
                self.stack.push(Construct::ComplexType(PendingComplexType {
                    name: attributes.get("name").map(String::from),
                    ..Default::default()
                }));
            }

            "simpleType" => {
                match self.stack.last() {
                    Some(Construct::Schema) | Some(Construct::Element(_)) => {}
                    _ => {
                        return Err(SchemaError::new("simpleType not allowed here")
                            .with_construct("simpleType")
                            .into())
                    }
                }
                self.stack.push(Construct::SimpleType(PendingSimpleType {
                    name: attributes.get("name").map(String::from),
                    base: None,
                    facets: FacetSet::new(),
                }));
            }

            "simpleContent" => {
                if !matches!(self.stack.last(), Some(Construct::ComplexType(_))) {
                    return Err(SchemaError::new("simpleContent outside complexType")
                        .with_construct("simpleContent")
                        .into());
                }
                self.stack.push(Construct::SimpleContent { base: None });
            }

            "restriction" => {
                match self.stack.last() {
                    Some(Construct::SimpleType(_)) | Some(Construct::SimpleContent { .. }) => {}
                    _ => {
                        return Err(SchemaError::new("restriction outside simpleType")
                            .with_construct("restriction")
                            .into())
                    }
                }
                let base = attributes
                    .get("base")
                    .ok_or_else(|| SchemaError::new("restriction requires a base attribute"))?;
                let base = self.resolve_simple_base(base)?;
                self.stack.push(Construct::Restriction {
                    base,
                    facets: FacetSet::new(),
                });
            }

            "extension" => {
                if !matches!(self.stack.last(), Some(Construct::SimpleContent { .. })) {
                    return Err(SchemaError::new("extension outside simpleContent")
                        .with_construct("extension")
                        .into());
                }
                let base = attributes
                    .get("base")
                    .ok_or_else(|| SchemaError::new("extension requires a base attribute"))?;
                let base = self.resolve_simple_base(base)?;
                self.stack.push(Construct::Extension { base });
            }

            "sequence" | "choice" | "all" => {
                let kind = match tag {
                    "sequence" => ModelKind::Sequence,
                    "choice" => ModelKind::Choice,
                    _ => ModelKind::All,
                };
                match self.stack.last() {
                    Some(Construct::ComplexType(_)) => {}
                    Some(Construct::Model(parent)) => {
                        if parent.kind == ModelKind::All {
                            return Err(SchemaError::new(
                                "groups may not be nested inside an all group",
                            )
                            .with_construct(tag)
                            .into());
                        }
                    }
                    _ => {
                        return Err(SchemaError::new("model group not allowed here")
                            .with_construct(tag)
                            .into())
                    }
                }
                let occurs =
                    parse_occurs(attributes.get("minOccurs"), attributes.get("maxOccurs"))?;
                self.stack.push(Construct::Model(PendingModel {
                    kind,
                    occurs,
                    children: Vec::new(),
                }));
            }

            "attribute" => {
                match self.stack.last() {
                    Some(Construct::Schema)
                    | Some(Construct::ComplexType(_))
                    | Some(Construct::Extension { .. })
                    | Some(Construct::Restriction { .. }) => {}
                    _ => {
                        return Err(SchemaError::new("attribute declaration not allowed here")
                            .with_construct("attribute")
                            .into())
                    }
                }
                let usage = match attributes.get("use") {
                    Some(u) => Some(AttrUse::parse(u)?),
                    None => None,
                };
                self.stack.push(Construct::Attribute(PendingAttribute {
                    name: attributes.get("name").map(String::from),
                    ref_name: attributes.get("ref").map(|r| local_name(r).to_string()),
                    type_attr: attributes.get("type").map(String::from),
                    usage,
                }));
            }

            "pattern" | "enumeration" | "whiteSpace" | "length" | "minLength" | "maxLength"
            | "minInclusive" | "minExclusive" | "maxInclusive" | "maxExclusive"
            | "totalDigits" | "fractionDigits" => {
                let value = attributes
                    .get("value")
                    .ok_or_else(|| {
                        SchemaError::new(format!("facet '{}' requires a value attribute", tag))
                    })?
                    .to_string();
                let Some(Construct::Restriction { facets, .. }) = self.stack.last_mut() else {
                    return Err(SchemaError::new(format!("facet '{}' outside restriction", tag))
                        .with_construct(tag)
                        .into());
                };
                apply_facet(facets, tag, &value)?;
                self.stack.push(Construct::Facet);
            }

            other => {
                return Err(SchemaError::new(format!(
                    "unsupported schema element '{}'",
                    other
                ))
                .into())
            }
        }

        Ok(())
    }

    fn end_construct(&mut self, tag: &str) -> Result<()> {
        let construct = self
            .stack
            .pop()
            .ok_or_else(|| SchemaError::new(format!("unbalanced end of '{}'", tag)))?;

        match construct {
            Construct::Schema | Construct::Facet => {}

            Construct::Element(pending) => self.finish_element(pending)?,

            Construct::ComplexType(pending) => self.finish_complex_type(pending)?,

            Construct::SimpleType(pending) => self.finish_simple_type(pending)?,

            Construct::SimpleContent { base } => {
                let base = base.ok_or_else(|| {
                    SchemaError::new("simpleContent requires a restriction or extension")
                })?;
                let Some(Construct::ComplexType(ct)) = self.stack.last_mut() else {
                    return Err(SchemaError::new("simpleContent outside complexType").into());
                };
                if ct.model.is_some() || ct.simple_content.is_some() {
                    return Err(SchemaError::new("complexType declares content twice").into());
                }
                ct.simple_content = Some(base);
            }

            Construct::Restriction { base, facets } => match self.stack.last() {
                Some(Construct::SimpleType(_)) => {
                    if let Some(Construct::SimpleType(st)) = self.stack.last_mut() {
                        st.base = Some(base);
                        st.facets = facets;
                    }
                }
                Some(Construct::SimpleContent { .. }) => {
                    // A facet-less restriction just names its base; with
                    // facets, an anonymous derived type carries them
                    let name = if facets.is_empty() {
                        base
                    } else {
                        let anon = self.fresh_anon_name();
                        self.types.register(&anon, &base, facets)?;
                        anon
                    };
                    if let Some(Construct::SimpleContent { base: slot }) = self.stack.last_mut() {
                        *slot = Some(name);
                    }
                }
                _ => return Err(SchemaError::new("restriction outside simpleType").into()),
            },

            Construct::Extension { base } => {
                let Some(Construct::SimpleContent { base: slot }) = self.stack.last_mut() else {
                    return Err(SchemaError::new("extension outside simpleContent").into());
                };
                *slot = Some(base);
            }

            Construct::Model(pending) => {
                let id = self.push(DefNode::Model {
                    kind: pending.kind,
                    occurs: pending.occurs,
                    children: pending.children,
                });
                match self.stack.last_mut() {
                    Some(Construct::ComplexType(ct)) => {
                        if ct.model.is_some() || ct.simple_content.is_some() {
                            return Err(
                                SchemaError::new("complexType declares content twice").into()
                            );
                        }
                        ct.model = Some(id);
                    }
                    Some(Construct::Model(parent)) => parent.children.push(id),
                    _ => return Err(SchemaError::new("model group not allowed here").into()),
                }
            }

            Construct::Attribute(pending) => self.finish_attribute(pending)?,
        }

        Ok(())
    }

    fn finish_element(&mut self, pending: PendingElement) -> Result<()> {
        let id = if let Some(ref_name) = pending.ref_name {
            // Point-of-use resolution: the referenced element must
            // already be in the library
            if !self.elements.contains_key(&ref_name) {
                return Err(SchemaError::new(format!(
                    "unresolved element reference '{}'",
                    ref_name
                ))
                .into());
            }
            self.push(DefNode::ElementRef {
                name: ref_name,
                occurs: pending.occurs,
            })
        } else {
            let name = pending
                .name
                .ok_or_else(|| SchemaError::new("element requires a name or ref attribute"))?;

            let content = match (pending.type_attr, pending.inline) {
                (Some(_), Some(_)) => {
                    return Err(SchemaError::new(format!(
                        "element '{}' declares both a type attribute and inline content",
                        name
                    ))
                    .into())
                }
                (Some(type_attr), None) => self.resolve_type(&type_attr)?,
                (None, Some(inline)) => inline,
                (None, None) => {
                    return Err(SchemaError::new(format!(
                        "element '{}' declares no type",
                        name
                    ))
                    .into())
                }
            };

            self.push(DefNode::Element {
                name,
                occurs: pending.occurs,
                content,
            })
        };

        match self.stack.last_mut() {
            Some(Construct::Schema) => {
                let name = match &self.nodes[id] {
                    DefNode::Element { name, .. } => name.clone(),
                    _ => {
                        return Err(SchemaError::new(
                            "top-level element may not be a reference",
                        )
                        .into())
                    }
                };
                self.elements.insert(name, id);
                if self.root_element.is_none() {
                    self.root_element = Some(id);
                }
            }
            Some(Construct::Model(parent)) => parent.children.push(id),
            _ => return Err(SchemaError::new("element declaration not allowed here").into()),
        }

        Ok(())
    }

    fn finish_complex_type(&mut self, pending: PendingComplexType) -> Result<()> {
        let content = match (pending.model, pending.simple_content) {
            (Some(model), None) => ComplexContent::Model(model),
            (None, Some(base)) => ComplexContent::SimpleContent(base),
            (None, None) => ComplexContent::Empty,
            (Some(_), Some(_)) => {
                return Err(SchemaError::new("complexType declares content twice").into())
            }
        };

        let id = self.push(DefNode::ComplexType {
            name: pending.name.clone(),
            content,
            attributes: pending.attributes,
        });

        match self.stack.last_mut() {
            Some(Construct::Schema) => {
                let name = pending.name.ok_or_else(|| {
                    SchemaError::new("top-level complexType requires a name")
                })?;
                self.complex_types.insert(name, id);
            }
            Some(Construct::Element(element)) => {
                element.inline = Some(ElementContent::Complex(id));
            }
            _ => return Err(SchemaError::new("complexType not allowed here").into()),
        }

        Ok(())
    }

    fn finish_simple_type(&mut self, pending: PendingSimpleType) -> Result<()> {
        let base = pending
            .base
            .ok_or_else(|| SchemaError::new("simpleType requires a restriction"))?;

        match self.stack.last() {
            Some(Construct::Schema) => {
                let name = pending.name.ok_or_else(|| {
                    SchemaError::new("top-level simpleType requires a name")
                })?;
                self.types.register(&name, &base, pending.facets)?;
            }
            Some(Construct::Element(_)) => {
                let anon = self.fresh_anon_name();
                self.types.register(&anon, &base, pending.facets)?;
                if let Some(Construct::Element(element)) = self.stack.last_mut() {
                    element.inline = Some(ElementContent::Simple(anon));
                }
            }
            _ => return Err(SchemaError::new("simpleType not allowed here").into()),
        }

        Ok(())
    }

    fn finish_attribute(&mut self, pending: PendingAttribute) -> Result<()> {
        let id = if let Some(ref_name) = pending.ref_name {
            if !self.attributes.contains_key(&ref_name) {
                return Err(SchemaError::new(format!(
                    "unresolved attribute reference '{}'",
                    ref_name
                ))
                .into());
            }
            self.push(DefNode::AttributeRef {
                name: ref_name,
                usage: pending.usage,
            })
        } else {
            let name = pending
                .name
                .ok_or_else(|| SchemaError::new("attribute requires a name or ref attribute"))?;
            let type_attr = pending.type_attr.ok_or_else(|| {
                SchemaError::new(format!("attribute '{}' declares no type", name))
            })?;
            let type_name = local_name(&type_attr);
            if !self.types.contains(type_name) {
                return Err(
                    SchemaError::new(format!("unresolved type '{}'", type_name)).into()
                );
            }
            self.push(DefNode::Attribute {
                name,
                type_name: type_name.to_string(),
                usage: pending.usage.unwrap_or(AttrUse::Optional),
            })
        };

        match self.stack.last_mut() {
            Some(Construct::Schema) => {
                let name = match &self.nodes[id] {
                    DefNode::Attribute { name, .. } => name.clone(),
                    _ => {
                        return Err(SchemaError::new(
                            "top-level attribute may not be a reference",
                        )
                        .into())
                    }
                };
                self.attributes.insert(name, id);
            }
            _ => {
                // Attach to the nearest enclosing complex type; extension
                // and restriction steps contribute to the same set
                let ct = self.stack.iter_mut().rev().find_map(|c| match c {
                    Construct::ComplexType(ct) => Some(ct),
                    _ => None,
                });
                match ct {
                    Some(ct) => ct.attributes.push(id),
                    None => {
                        return Err(SchemaError::new(
                            "attribute declaration not allowed here",
                        )
                        .into())
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHandler for SchemaCompiler {
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        let tag = local_name(name);

        if self.skip_depth > 0 || matches!(tag, "annotation" | "documentation" | "appinfo") {
            self.skip_depth += 1;
            return Ok(());
        }

        self.start_construct(tag, attributes)
    }

    fn characters(&mut self, _text: &str) -> Result<()> {
        // Schema documents carry text only inside documentation, which
        // is skipped wholesale
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }

        self.end_construct(local_name(name))
    }
}

/// Parse one facet element's value into the restriction's facet set
fn apply_facet(facets: &mut FacetSet, tag: &str, value: &str) -> Result<()> {
    fn count(tag: &str, value: &str) -> Result<usize> {
        value.parse::<usize>().map_err(|_| {
            SchemaError::new(format!("facet '{}' requires a non-negative integer", tag)).into()
        })
    }

    fn decimal(tag: &str, value: &str) -> Result<rust_decimal::Decimal> {
        value.parse().map_err(|_| {
            SchemaError::new(format!("facet '{}' requires a decimal value", tag)).into()
        })
    }

    match tag {
        "pattern" => facets.patterns.push(PatternFacet::new(value)?),
        "enumeration" => facets
            .enumeration
            .get_or_insert_with(Vec::new)
            .push(value.to_string()),
        "whiteSpace" => facets.white_space = Some(WhiteSpace::parse(value)?),
        "length" => facets.length = Some(count(tag, value)?),
        "minLength" => facets.min_length = Some(count(tag, value)?),
        "maxLength" => facets.max_length = Some(count(tag, value)?),
        "minInclusive" => facets.min_inclusive = Some(decimal(tag, value)?),
        "minExclusive" => facets.min_exclusive = Some(decimal(tag, value)?),
        "maxInclusive" => facets.max_inclusive = Some(decimal(tag, value)?),
        "maxExclusive" => facets.max_exclusive = Some(decimal(tag, value)?),
        "totalDigits" => facets.total_digits = Some(count(tag, value)? as u32),
        "fractionDigits" => facets.fraction_digits = Some(count(tag, value)? as u32),
        _ => unreachable!("caller matched the facet tag"),
    }

    Ok(())
}
