//! Constraining facets
//!
//! Facet values restrict the legal lexical space of a simple type. A
//! `FacetSet` holds the facets declared by one restriction step; the
//! effective set for a derived type is produced by overlaying sets along
//! the base chain, most-derived first (see `types`).
//!
//! Application order is fixed: pattern, enumeration, length family,
//! numeric bounds, digit counts. The engine stops at the first violation.

use crate::error::{Result, SchemaError, ValueError};
use regex::Regex;
use rust_decimal::Decimal;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs, carriage returns and newlines with spaces
    Replace,
    /// Replace, collapse runs of spaces and trim
    Collapse,
}

impl WhiteSpace {
    /// Parse from an attribute value
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(SchemaError::new(format!(
                "invalid whiteSpace value: '{}'. Must be 'preserve', 'replace', or 'collapse'",
                s
            ))
            .into()),
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => {
                let replaced = s.replace(['\t', '\n', '\r'], " ");
                let mut result = String::new();
                let mut prev_space = true; // Start with true to trim leading spaces

                for c in replaced.chars() {
                    if c == ' ' {
                        if !prev_space {
                            result.push(' ');
                            prev_space = true;
                        }
                    } else {
                        result.push(c);
                        prev_space = false;
                    }
                }

                result.trim_end().to_string()
            }
        }
    }
}

/// A compiled pattern facet.
///
/// Patterns are implicitly anchored: the whole value must match.
#[derive(Debug, Clone)]
pub struct PatternFacet {
    /// The declared pattern
    pub source: String,
    regex: Regex,
}

impl PatternFacet {
    /// Compile a pattern facet
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            SchemaError::new(format!("invalid pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether a value matches the pattern
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// The facets declared by a single restriction step
#[derive(Debug, Clone, Default)]
pub struct FacetSet {
    /// White space handling
    pub white_space: Option<WhiteSpace>,
    /// Pattern facets; a value must match at least one of the step's patterns
    pub patterns: Vec<PatternFacet>,
    /// Enumeration literals
    pub enumeration: Option<Vec<String>>,
    /// Exact length
    pub length: Option<usize>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Minimum value (inclusive)
    pub min_inclusive: Option<Decimal>,
    /// Minimum value (exclusive)
    pub min_exclusive: Option<Decimal>,
    /// Maximum value (inclusive)
    pub max_inclusive: Option<Decimal>,
    /// Maximum value (exclusive)
    pub max_exclusive: Option<Decimal>,
    /// Maximum number of significant digits
    pub total_digits: Option<u32>,
    /// Maximum number of fractional digits
    pub fraction_digits: Option<u32>,
}

impl FacetSet {
    /// Create an empty facet set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no facet is declared
    pub fn is_empty(&self) -> bool {
        self.white_space.is_none()
            && self.patterns.is_empty()
            && self.enumeration.is_none()
            && self.length.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_inclusive.is_none()
            && self.max_exclusive.is_none()
            && self.total_digits.is_none()
            && self.fraction_digits.is_none()
    }

    /// Fill every facet slot not declared here from a base set.
    ///
    /// This is the overlay step of effective-facet computation: walking
    /// the base chain most-derived-first, the nearest declaration wins.
    pub fn overlay(&mut self, base: &FacetSet) {
        if self.white_space.is_none() {
            self.white_space = base.white_space;
        }
        if self.patterns.is_empty() {
            self.patterns = base.patterns.clone();
        }
        if self.enumeration.is_none() {
            self.enumeration = base.enumeration.clone();
        }
        if self.length.is_none() {
            self.length = base.length;
        }
        if self.min_length.is_none() {
            self.min_length = base.min_length;
        }
        if self.max_length.is_none() {
            self.max_length = base.max_length;
        }
        if self.min_inclusive.is_none() {
            self.min_inclusive = base.min_inclusive;
        }
        if self.min_exclusive.is_none() {
            self.min_exclusive = base.min_exclusive;
        }
        if self.max_inclusive.is_none() {
            self.max_inclusive = base.max_inclusive;
        }
        if self.max_exclusive.is_none() {
            self.max_exclusive = base.max_exclusive;
        }
        if self.total_digits.is_none() {
            self.total_digits = base.total_digits;
        }
        if self.fraction_digits.is_none() {
            self.fraction_digits = base.fraction_digits;
        }
    }

    /// Validate a normalized value against the facets, in engine order.
    ///
    /// `numeric` carries the value parsed as a decimal when the type
    /// belongs to the decimal/integer family; bound and digit facets are
    /// only applied when it is present.
    pub fn validate(&self, value: &str, numeric: Option<&Decimal>) -> Result<()> {
        self.check_patterns(value)?;
        self.check_enumeration(value)?;
        self.check_lengths(value)?;

        if let Some(number) = numeric {
            self.check_bounds(value, number)?;
            self.check_digits(value, number)?;
        }

        Ok(())
    }

    fn check_patterns(&self, value: &str) -> Result<()> {
        if self.patterns.is_empty() {
            return Ok(());
        }
        if self.patterns.iter().any(|p| p.matches(value)) {
            Ok(())
        } else {
            let shown = &self.patterns[0].source;
            Err(ValueError::new(format!("value does not match pattern '{}'", shown))
                .with_facet("pattern")
                .with_value(value)
                .into())
        }
    }

    fn check_enumeration(&self, value: &str) -> Result<()> {
        match &self.enumeration {
            Some(literals) if !literals.iter().any(|l| l == value) => {
                Err(ValueError::new(format!(
                    "value is not in the enumeration {:?}",
                    literals
                ))
                .with_facet("enumeration")
                .with_value(value)
                .into())
            }
            _ => Ok(()),
        }
    }

    fn check_lengths(&self, value: &str) -> Result<()> {
        let len = value.chars().count();

        if let Some(expected) = self.length {
            if len != expected {
                return Err(ValueError::new(format!(
                    "length must be exactly {}, got {}",
                    expected, len
                ))
                .with_facet("length")
                .with_value(value)
                .into());
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(ValueError::new(format!(
                    "length must be at least {}, got {}",
                    min, len
                ))
                .with_facet("minLength")
                .with_value(value)
                .into());
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(ValueError::new(format!(
                    "length must be at most {}, got {}",
                    max, len
                ))
                .with_facet("maxLength")
                .with_value(value)
                .into());
            }
        }

        Ok(())
    }

    fn check_bounds(&self, value: &str, number: &Decimal) -> Result<()> {
        if let Some(bound) = &self.min_inclusive {
            if number < bound {
                return Err(ValueError::new(format!("value must be >= {}", bound))
                    .with_facet("minInclusive")
                    .with_value(value)
                    .into());
            }
        }
        if let Some(bound) = &self.min_exclusive {
            if number <= bound {
                return Err(ValueError::new(format!("value must be > {}", bound))
                    .with_facet("minExclusive")
                    .with_value(value)
                    .into());
            }
        }
        if let Some(bound) = &self.max_inclusive {
            if number > bound {
                return Err(ValueError::new(format!("value must be <= {}", bound))
                    .with_facet("maxInclusive")
                    .with_value(value)
                    .into());
            }
        }
        if let Some(bound) = &self.max_exclusive {
            if number >= bound {
                return Err(ValueError::new(format!("value must be < {}", bound))
                    .with_facet("maxExclusive")
                    .with_value(value)
                    .into());
            }
        }

        Ok(())
    }

    fn check_digits(&self, value: &str, number: &Decimal) -> Result<()> {
        if let Some(limit) = self.total_digits {
            let normalized = number.normalize();
            let digits = normalized
                .to_string()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .count() as u32;
            if digits > limit {
                return Err(ValueError::new(format!(
                    "value has {} digits, totalDigits limit is {}",
                    digits, limit
                ))
                .with_facet("totalDigits")
                .with_value(value)
                .into());
            }
        }
        if let Some(limit) = self.fraction_digits {
            let scale = number.normalize().scale();
            if scale > limit {
                return Err(ValueError::new(format!(
                    "value has {} fractional digits, fractionDigits limit is {}",
                    scale, limit
                ))
                .with_facet("fractionDigits")
                .with_value(value)
                .into());
            }
        }

        Ok(())
    }
}
