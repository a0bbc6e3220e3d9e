//! Built-in types
//!
//! The primitive types with their fixed lexical grammars, and the table
//! of derived built-ins (token, integer family, ...) that the type
//! library is seeded with. Derived built-ins are expressed as ordinary
//! restriction steps, so the same chain walk that serves user types
//! serves them.

use crate::error::{Result, ValueError};
use crate::names::is_valid_qname;
use crate::schema::facets::{FacetSet, PatternFacet, WhiteSpace};
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// The XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

lazy_static::lazy_static! {
    /// Boolean lexical forms
    static ref BOOLEAN_MAP: HashMap<&'static str, bool> = {
        let mut m = HashMap::new();
        m.insert("false", false);
        m.insert("0", false);
        m.insert("true", true);
        m.insert("1", true);
        m
    };
}

static FLOAT_LEXICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?|[+-]?INF|NaN)$").unwrap()
});

static TZ_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:Z|[+-]\d{2}:\d{2})$").unwrap());

static GYEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{4,}-(?:0[1-9]|1[0-2])$").unwrap());

static GYEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d{4,}$").unwrap());

static GMONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--(?:0[1-9]|1[0-2])-(?:0[1-9]|[12]\d|3[01])$").unwrap());

static GDAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---(?:0[1-9]|[12]\d|3[01])$").unwrap());

static GMONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^--(?:0[1-9]|1[0-2])$").unwrap());

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(?:\.\d+)?S)?)?$").unwrap()
});

static HEX_BINARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[0-9a-fA-F]{2})*$").unwrap());

/// The primitive root of every simple type's derivation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// xs:string
    String,
    /// xs:boolean
    Boolean,
    /// xs:decimal (root of the integer family)
    Decimal,
    /// xs:float
    Float,
    /// xs:double
    Double,
    /// xs:dateTime
    DateTime,
    /// xs:time
    Time,
    /// xs:date
    Date,
    /// xs:gYearMonth
    GYearMonth,
    /// xs:gYear
    GYear,
    /// xs:gMonthDay
    GMonthDay,
    /// xs:gDay
    GDay,
    /// xs:gMonth
    GMonth,
    /// xs:duration
    Duration,
    /// xs:hexBinary
    HexBinary,
    /// xs:base64Binary
    Base64Binary,
    /// xs:anyURI
    AnyUri,
    /// xs:QName
    QName,
    /// xs:NOTATION
    Notation,
}

impl Primitive {
    /// All primitives, in registration order
    pub fn all() -> &'static [Primitive] {
        use Primitive::*;
        &[
            String, Boolean, Decimal, Float, Double, DateTime, Time, Date, GYearMonth, GYear,
            GMonthDay, GDay, GMonth, Duration, HexBinary, Base64Binary, AnyUri, QName, Notation,
        ]
    }

    /// The type name this primitive is registered under
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Decimal => "decimal",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::DateTime => "dateTime",
            Primitive::Time => "time",
            Primitive::Date => "date",
            Primitive::GYearMonth => "gYearMonth",
            Primitive::GYear => "gYear",
            Primitive::GMonthDay => "gMonthDay",
            Primitive::GDay => "gDay",
            Primitive::GMonth => "gMonth",
            Primitive::Duration => "duration",
            Primitive::HexBinary => "hexBinary",
            Primitive::Base64Binary => "base64Binary",
            Primitive::AnyUri => "anyURI",
            Primitive::QName => "QName",
            Primitive::Notation => "NOTATION",
        }
    }

    /// The whiteSpace mode the primitive itself declares
    pub fn white_space(&self) -> WhiteSpace {
        match self {
            Primitive::String => WhiteSpace::Preserve,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Whether numeric bound and digit facets apply to this primitive.
    ///
    /// Only the decimal/integer family; float, double and the date/time
    /// family carry such facets without enforcing them.
    pub fn is_decimal_family(&self) -> bool {
        matches!(self, Primitive::Decimal)
    }

    /// Check a normalized value against this primitive's lexical grammar
    pub fn check_lexical(&self, value: &str) -> Result<()> {
        let ok = match self {
            Primitive::String => true,
            Primitive::Boolean => BOOLEAN_MAP.contains_key(value),
            Primitive::Decimal => !value.is_empty() && value.parse::<Decimal>().is_ok(),
            Primitive::Float | Primitive::Double => FLOAT_LEXICAL.is_match(value),
            Primitive::DateTime => {
                let core = TZ_SUFFIX.replace(value, "");
                NaiveDateTime::parse_from_str(&core, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            }
            Primitive::Time => {
                let core = TZ_SUFFIX.replace(value, "");
                NaiveTime::parse_from_str(&core, "%H:%M:%S%.f").is_ok()
            }
            Primitive::Date => {
                let core = TZ_SUFFIX.replace(value, "");
                NaiveDate::parse_from_str(&core, "%Y-%m-%d").is_ok()
            }
            Primitive::GYearMonth => GYEAR_MONTH.is_match(&TZ_SUFFIX.replace(value, "")),
            Primitive::GYear => GYEAR.is_match(&TZ_SUFFIX.replace(value, "")),
            Primitive::GMonthDay => GMONTH_DAY.is_match(&TZ_SUFFIX.replace(value, "")),
            Primitive::GDay => GDAY.is_match(&TZ_SUFFIX.replace(value, "")),
            Primitive::GMonth => GMONTH.is_match(&TZ_SUFFIX.replace(value, "")),
            Primitive::Duration => check_duration(value),
            Primitive::HexBinary => HEX_BINARY.is_match(value),
            Primitive::Base64Binary => {
                let packed: String = value.chars().filter(|c| *c != ' ').collect();
                base64::engine::general_purpose::STANDARD.decode(&packed).is_ok()
            }
            Primitive::AnyUri => check_any_uri(value),
            Primitive::QName | Primitive::Notation => is_valid_qname(value),
        };

        if ok {
            Ok(())
        } else {
            Err(ValueError::new(format!("value is not a valid xs:{}", self.name()))
                .with_value(value)
                .with_type(self.name())
                .into())
        }
    }
}

/// xs:duration needs at least one component, and a 'T' only with a
/// time component after it; the regex alone cannot express that.
fn check_duration(value: &str) -> bool {
    let Some(caps) = DURATION.captures(value) else {
        return false;
    };

    let date_part = caps.get(1).is_some() || caps.get(2).is_some() || caps.get(3).is_some();
    match caps.get(4) {
        Some(_) => {
            let time_part =
                caps.get(5).is_some() || caps.get(6).is_some() || caps.get(7).is_some();
            time_part
        }
        None => date_part,
    }
}

/// xs:anyURI admits relative references, which `url::Url` alone rejects;
/// those are accepted after a minimal character check.
fn check_any_uri(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(_) => true,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            !value.contains(' ') && !value.contains(['<', '>', '"'])
        }
        Err(_) => false,
    }
}

fn pattern(source: &str) -> PatternFacet {
    PatternFacet::new(source).expect("builtin pattern must compile")
}

fn bounds(min: &str, max: &str) -> FacetSet {
    FacetSet {
        min_inclusive: Some(min.parse().expect("builtin bound")),
        max_inclusive: Some(max.parse().expect("builtin bound")),
        ..Default::default()
    }
}

/// The derived built-ins seeded into every type library, in registration
/// order: `(name, base, facets)`. Each base precedes its derivations, so
/// the single-pass registration invariant holds for the seed itself.
pub fn derived_builtins() -> Vec<(&'static str, &'static str, FacetSet)> {
    vec![
        (
            "normalizedString",
            "string",
            FacetSet { white_space: Some(WhiteSpace::Replace), ..Default::default() },
        ),
        (
            "token",
            "normalizedString",
            FacetSet { white_space: Some(WhiteSpace::Collapse), ..Default::default() },
        ),
        (
            "language",
            "token",
            FacetSet {
                patterns: vec![pattern("[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*")],
                ..Default::default()
            },
        ),
        (
            "Name",
            "token",
            FacetSet {
                patterns: vec![pattern(r"[A-Za-z_:][A-Za-z0-9_:\-\.]*")],
                ..Default::default()
            },
        ),
        (
            "NCName",
            "Name",
            FacetSet {
                patterns: vec![pattern(r"[A-Za-z_][A-Za-z0-9_\-\.]*")],
                ..Default::default()
            },
        ),
        ("ID", "NCName", FacetSet::new()),
        ("IDREF", "NCName", FacetSet::new()),
        (
            "NMTOKEN",
            "token",
            FacetSet {
                patterns: vec![pattern(r"[A-Za-z0-9_:\-\.]+")],
                ..Default::default()
            },
        ),
        (
            "integer",
            "decimal",
            FacetSet {
                fraction_digits: Some(0),
                patterns: vec![pattern(r"[\-+]?[0-9]+")],
                ..Default::default()
            },
        ),
        (
            "nonPositiveInteger",
            "integer",
            FacetSet {
                max_inclusive: Some(Decimal::ZERO),
                ..Default::default()
            },
        ),
        (
            "negativeInteger",
            "nonPositiveInteger",
            FacetSet {
                max_inclusive: Some(Decimal::NEGATIVE_ONE),
                ..Default::default()
            },
        ),
        ("long", "integer", bounds("-9223372036854775808", "9223372036854775807")),
        ("int", "long", bounds("-2147483648", "2147483647")),
        ("short", "int", bounds("-32768", "32767")),
        ("byte", "short", bounds("-128", "127")),
        (
            "nonNegativeInteger",
            "integer",
            FacetSet {
                min_inclusive: Some(Decimal::ZERO),
                ..Default::default()
            },
        ),
        ("unsignedLong", "nonNegativeInteger", bounds("0", "18446744073709551615")),
        ("unsignedInt", "unsignedLong", bounds("0", "4294967295")),
        ("unsignedShort", "unsignedInt", bounds("0", "65535")),
        ("unsignedByte", "unsignedShort", bounds("0", "255")),
        (
            "positiveInteger",
            "nonNegativeInteger",
            FacetSet {
                min_inclusive: Some(Decimal::ONE),
                ..Default::default()
            },
        ),
    ]
}
