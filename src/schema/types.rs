//! Type library
//!
//! Registry of named simple types: the built-in primitives, the derived
//! built-ins, and user types registered during schema compilation. Each
//! entry carries its base-type name (chaining to a primitive) and the
//! facets of its own restriction step.
//!
//! Registration is single-pass and order-dependent: a type must be
//! registered after the type it derives from. The effective facet set of
//! a type walks the chain most-derived-first; nothing prevents a derived
//! type from loosening a base restriction.

use crate::error::{Error, Result, SchemaError};
use crate::schema::builtins::{derived_builtins, Primitive};
use crate::schema::facets::{FacetSet, WhiteSpace};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// A named simple type: one restriction step over a base
#[derive(Debug, Clone)]
pub struct SimpleTypeDef {
    /// Type name
    pub name: String,
    /// Base type name; `None` for primitives
    pub base: Option<String>,
    /// The primitive at the root of the derivation chain
    pub primitive: Primitive,
    /// Facets declared by this restriction step
    pub facets: FacetSet,
}

/// Registry of named simple types
#[derive(Debug, Clone)]
pub struct TypeLibrary {
    types: IndexMap<String, SimpleTypeDef>,
}

impl TypeLibrary {
    /// Create a library seeded with the built-in types
    pub fn with_builtins() -> Self {
        let mut library = Self { types: IndexMap::new() };

        for primitive in Primitive::all() {
            let facets = FacetSet {
                white_space: Some(primitive.white_space()),
                ..Default::default()
            };
            library.types.insert(
                primitive.name().to_string(),
                SimpleTypeDef {
                    name: primitive.name().to_string(),
                    base: None,
                    primitive: *primitive,
                    facets,
                },
            );
        }

        for (name, base, facets) in derived_builtins() {
            library
                .register(name, base, facets)
                .expect("builtin derivation table is ordered");
        }

        library
    }

    /// Whether a type name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Look up a type definition
    pub fn get(&self, name: &str) -> Option<&SimpleTypeDef> {
        self.types.get(name)
    }

    /// Register a derived simple type.
    ///
    /// The base must already be registered (forward references are not
    /// resolved). Declaring an enumeration facet on the decimal family
    /// is rejected here.
    pub fn register(&mut self, name: &str, base: &str, facets: FacetSet) -> Result<()> {
        if self.types.contains_key(name) {
            return Err(
                SchemaError::new(format!("duplicate simple type '{}'", name)).into()
            );
        }

        let base_def = self.types.get(base).ok_or_else(|| {
            SchemaError::new(format!(
                "unresolved base type '{}' for simple type '{}'",
                base, name
            ))
        })?;
        let primitive = base_def.primitive;

        if facets.enumeration.is_some() && primitive.is_decimal_family() {
            return Err(SchemaError::new(format!(
                "enumeration facet is not supported on the decimal family (type '{}')",
                name
            ))
            .into());
        }

        self.types.insert(
            name.to_string(),
            SimpleTypeDef {
                name: name.to_string(),
                base: Some(base.to_string()),
                primitive,
                facets,
            },
        );

        Ok(())
    }

    /// Compute the effective facet set of a type: its own facets overlaid
    /// with every ancestor's, nearest declaration winning
    pub fn effective_facets(&self, name: &str) -> Result<FacetSet> {
        let mut def = self.lookup(name)?;
        let mut effective = def.facets.clone();

        while let Some(base) = &def.base {
            def = self.lookup(base)?;
            effective.overlay(&def.facets);
        }

        Ok(effective)
    }

    /// Validate a raw text value against a named type.
    ///
    /// Normalizes per the effective whiteSpace facet, checks the
    /// primitive's lexical grammar, then applies the remaining facets in
    /// engine order, stopping at the first violation.
    pub fn validate(&self, name: &str, raw: &str) -> Result<()> {
        let def = self.lookup(name)?;
        let effective = self.effective_facets(name)?;

        let white_space = effective.white_space.unwrap_or(WhiteSpace::Collapse);
        let value = white_space.normalize(raw);

        def.primitive
            .check_lexical(&value)
            .map_err(|e| Self::tag_type(e, name))?;

        let numeric: Option<Decimal> = if def.primitive.is_decimal_family() {
            value.parse().ok()
        } else {
            None
        };

        effective
            .validate(&value, numeric.as_ref())
            .map_err(|e| Self::tag_type(e, name))
    }

    fn lookup(&self, name: &str) -> Result<&SimpleTypeDef> {
        self.types.get(name).ok_or_else(|| {
            SchemaError::new(format!("unresolved simple type '{}'", name)).into()
        })
    }

    /// Attach the validated type's name to a value error that lacks one
    fn tag_type(err: Error, name: &str) -> Error {
        match err {
            Error::Value(mut e) => {
                e.type_name.get_or_insert_with(|| name.to_string());
                Error::Value(e)
            }
            other => other,
        }
    }
}

impl Default for TypeLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::facets::PatternFacet;

    fn violated_facet(result: Result<()>) -> String {
        match result.unwrap_err() {
            Error::Value(e) => e.facet.expect("facet name"),
            other => panic!("expected value error, got {}", other),
        }
    }

    #[test]
    fn test_builtin_integer_family() {
        let library = TypeLibrary::with_builtins();

        assert!(library.validate("int", "42").is_ok());
        assert!(library.validate("int", "-2147483648").is_ok());
        assert!(library.validate("int", "2147483648").is_err());
        assert!(library.validate("byte", "127").is_ok());
        assert!(library.validate("byte", "128").is_err());
        assert!(library.validate("positiveInteger", "0").is_err());
        assert!(library.validate("nonNegativeInteger", "0").is_ok());
        assert!(library.validate("integer", "1.5").is_err());
    }

    #[test]
    fn test_whitespace_along_chain() {
        let library = TypeLibrary::with_builtins();

        // string preserves; token collapses before lexical checks
        assert!(library.validate("string", "  a  b  ").is_ok());
        assert!(library.validate("int", "  42  ").is_ok()); // collapse strips the padding
        assert!(library.validate("boolean", " true ").is_ok());
    }

    #[test]
    fn test_user_derivation_chain() {
        let mut library = TypeLibrary::with_builtins();

        library
            .register(
                "foo",
                "string",
                FacetSet { min_length: Some(10), ..Default::default() },
            )
            .unwrap();
        library
            .register(
                "foo_bar",
                "foo",
                FacetSet { length: Some(10), ..Default::default() },
            )
            .unwrap();

        assert!(library.validate("foo_bar", "abcdefghij").is_ok());
        // A 9-character value violates both minLength and length; one report
        let facet = violated_facet(library.validate("foo_bar", "abcdefghi"));
        assert!(facet == "length" || facet == "minLength");
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut library = TypeLibrary::with_builtins();
        let err = library
            .register("derived", "not_yet_defined", FacetSet::new())
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut library = TypeLibrary::with_builtins();
        library.register("mine", "string", FacetSet::new()).unwrap();
        assert!(library.register("mine", "string", FacetSet::new()).is_err());
    }

    #[test]
    fn test_enumeration_unsupported_on_decimal_family() {
        let mut library = TypeLibrary::with_builtins();

        let err = library
            .register(
                "digits",
                "integer",
                FacetSet {
                    enumeration: Some(vec!["1".into(), "2".into()]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        // Fine on string-family types
        library
            .register(
                "color",
                "string",
                FacetSet {
                    enumeration: Some(vec!["red".into(), "blue".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(library.validate("color", "red").is_ok());
        assert_eq!(violated_facet(library.validate("color", "green")), "enumeration");
    }

    #[test]
    fn test_pattern_facet_on_user_type() {
        let mut library = TypeLibrary::with_builtins();
        library
            .register(
                "zip",
                "string",
                FacetSet {
                    patterns: vec![PatternFacet::new(r"\d{5}").unwrap()],
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(library.validate("zip", "12345").is_ok());
        assert_eq!(violated_facet(library.validate("zip", "1234")), "pattern");
    }

    #[test]
    fn test_loosening_is_permitted() {
        let mut library = TypeLibrary::with_builtins();
        library
            .register(
                "strict",
                "string",
                FacetSet { max_length: Some(3), ..Default::default() },
            )
            .unwrap();
        // Derived type loosens the base's maxLength; accepted latitude
        library
            .register(
                "loose",
                "strict",
                FacetSet { max_length: Some(10), ..Default::default() },
            )
            .unwrap();

        assert!(library.validate("strict", "abcd").is_err());
        assert!(library.validate("loose", "abcd").is_ok());
    }
}
