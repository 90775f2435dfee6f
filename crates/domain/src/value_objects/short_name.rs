//! URL slug identifying a node among its siblings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

const MAX_SHORT_NAME_LENGTH: usize = 100;

/// Trailing `/loc` segment selecting a node's stats. No node may use it.
pub const STATS_SEGMENT: &str = "stats";

/// A lower-case URL segment made of `[a-z0-9_-]`.
///
/// Uniqueness is NOT a property of the slug itself: two nodes may share a
/// short name as long as they hang off different parents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortName(String);

impl ShortName {
    /// Validate an already slug-shaped value. Input is trimmed and lower-cased.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let normalized = Self::normalize(&value.into());
        if normalized.is_empty() {
            return Err(DomainError::validation("Short name cannot be empty"));
        }
        if normalized.len() > MAX_SHORT_NAME_LENGTH {
            return Err(DomainError::validation(format!(
                "Short name cannot exceed {} characters",
                MAX_SHORT_NAME_LENGTH
            )));
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(DomainError::validation(format!(
                "Short name '{}' contains invalid character '{}'",
                normalized, bad
            )));
        }
        if normalized == STATS_SEGMENT {
            return Err(DomainError::validation(format!(
                "Short name '{}' is reserved",
                STATS_SEGMENT
            )));
        }
        Ok(Self(normalized))
    }

    /// Derive a slug from a free-form display name ("Santa Monica" -> "santa-monica").
    pub fn slugify(name: &str) -> Result<Self, DomainError> {
        let mut slug = String::with_capacity(name.len());
        for c in name.trim().chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        Self::new(slug.trim_matches('-'))
    }

    /// Key used to compare legacy short names, which were never validated.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ShortName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ShortName> for String {
    fn from(name: ShortName) -> String {
        name.0
    }
}

impl AsRef<str> for ShortName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
