//! Occurrence bounds
//!
//! `[minOccurs, maxOccurs]` ranges for elements and model groups.
//! `None` for the maximum means unbounded.

use crate::error::{Result, SchemaError};

/// Occurrence bounds for an element or model group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Check if the bounds admit zero occurrences
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if an occurrence count is under the minimum
    pub fn is_missing(&self, count: u32) -> bool {
        count < self.min
    }

    /// Check if an occurrence count has reached the maximum
    pub fn is_over(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count >= max,
            None => false,
        }
    }

    /// Check if an occurrence count exceeds the maximum
    pub fn is_exceeded(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count > max,
            None => false,
        }
    }

    /// Check if an occurrence count lies within the bounds
    pub fn contains(&self, count: u32) -> bool {
        count >= self.min
            && match self.max {
                Some(max) => count <= max,
                None => true,
            }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Parse minOccurs/maxOccurs attribute values into occurrence bounds
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.parse::<u32>().map_err(|_| {
            SchemaError::new("minOccurs value is not a valid non-negative integer")
        })?;
    }

    match max_occurs {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<u32>().map_err(|_| {
                SchemaError::new("maxOccurs value must be a non-negative integer or 'unbounded'")
            })?;
            if occurs.min > max {
                return Err(SchemaError::new(
                    "maxOccurs must be 'unbounded' or greater than or equal to minOccurs",
                )
                .into());
            }
            occurs.max = Some(max);
        }
        None => {
            // Default maxOccurs is 1 and must cover minOccurs
            if occurs.min > 1 {
                return Err(
                    SchemaError::new("minOccurs must be lesser or equal than maxOccurs").into()
                );
            }
        }
    }

    Ok(occurs)
}
