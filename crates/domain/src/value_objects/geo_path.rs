//! Slash-delimited geographic URL paths.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::DomainError;

/// Ordered, non-empty list of path segments, root first.
///
/// Segments are kept as lower-cased strings rather than [`ShortName`]s:
/// a segment that is not a valid slug simply never matches a node, and the
/// trailing segment may be a spot `name-id` reference instead.
///
/// [`ShortName`]: crate::value_objects::ShortName
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeoPath(Vec<String>);

impl GeoPath {
    /// Parse `"us/ca/san-diego"`. Empty segments (leading, trailing or
    /// doubled slashes) are ignored.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let segments: Vec<String> = raw
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self::from_segments(segments)
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(DomainError::validation("Geographic path cannot be empty"));
        }
        if segments.iter().any(|s| s.is_empty() || s.contains('/')) {
            return Err(DomainError::validation(
                "Geographic path segments must be non-empty and slash-free",
            ));
        }
        Ok(Self(segments))
    }

    /// One-segment path. The caller guarantees `segment` is a non-empty slug.
    pub(crate) fn single(segment: &str) -> Self {
        Self(vec![segment.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Path without its trailing segment, `None` for a single-segment path.
    pub fn parent(&self) -> Option<GeoPath> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Path extended by one segment.
    pub fn child(&self, segment: impl Into<String>) -> GeoPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// URL form under the geography endpoint, e.g. `/loc/us/ca`.
    pub fn to_url(&self) -> String {
        format!("/loc/{}", self)
    }
}

impl fmt::Display for GeoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl Serialize for GeoPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
