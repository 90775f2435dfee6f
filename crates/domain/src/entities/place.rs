//! Spots and dive shops, the rows geography listings aggregate.
//!
//! Reviews and rating maths live elsewhere; a place only carries the
//! pre-computed `avg_rating` and `num_reviews` used as sort keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::LegacyLinkage;
use crate::error::DomainError;
use crate::ids::{NodeId, PlaceId};
use crate::value_objects::ShortName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceKind {
    Spot,
    Shop,
}

impl fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceKind::Spot => write!(f, "spot"),
            PlaceKind::Shop => write!(f, "shop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub kind: PlaceKind,
    pub id: PlaceId,
    pub name: String,
    pub geographic_node_id: Option<NodeId>,
    #[serde(flatten)]
    pub legacy: LegacyLinkage,
    pub avg_rating: f64,
    pub num_reviews: i64,
    pub created_at: DateTime<Utc>,
}

impl Place {
    /// Slug of the display name, `None` if the name has no usable characters.
    pub fn slug(&self) -> Option<ShortName> {
        ShortName::slugify(&self.name).ok()
    }

    /// The `<name>-<id>` segment used in place URLs.
    pub fn name_id(&self) -> String {
        match self.slug() {
            Some(slug) => format!("{}-{}", slug, self.id),
            None => self.id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlace {
    pub kind: PlaceKind,
    pub name: String,
    pub geographic_node_id: Option<NodeId>,
    pub legacy: LegacyLinkage,
    pub avg_rating: f64,
    pub num_reviews: i64,
}

impl NewPlace {
    pub fn new(kind: PlaceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            geographic_node_id: None,
            legacy: LegacyLinkage::default(),
            avg_rating: 0.0,
            num_reviews: 0,
        }
    }

    pub fn in_node(mut self, node_id: NodeId) -> Self {
        self.geographic_node_id = Some(node_id);
        self
    }

    pub fn with_legacy(mut self, legacy: LegacyLinkage) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_rating(mut self, avg_rating: f64, num_reviews: i64) -> Self {
        self.avg_rating = avg_rating;
        self.num_reviews = num_reviews;
        self
    }
}

/// Which collections a geography listing returns (`type=` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceTypeFilter {
    Spots,
    Shops,
    #[default]
    All,
}

impl PlaceTypeFilter {
    pub fn includes(self, kind: PlaceKind) -> bool {
        matches!(
            (self, kind),
            (PlaceTypeFilter::All, _)
                | (PlaceTypeFilter::Spots, PlaceKind::Spot)
                | (PlaceTypeFilter::Shops, PlaceKind::Shop)
        )
    }
}

impl FromStr for PlaceTypeFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spots" => Ok(PlaceTypeFilter::Spots),
            "shops" => Ok(PlaceTypeFilter::Shops),
            "all" => Ok(PlaceTypeFilter::All),
            other => Err(DomainError::parse(format!(
                "Unknown type '{}', expected spots, shops or all",
                other
            ))),
        }
    }
}

/// Listing order (`sort=` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceSort {
    /// Best rated first, ties broken by review count.
    #[default]
    Top,
    /// Most recently created first.
    Latest,
    /// Most reviewed first, ties broken by rating.
    MostReviewed,
}

impl FromStr for PlaceSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(PlaceSort::Top),
            "latest" => Ok(PlaceSort::Latest),
            "most_reviewed" => Ok(PlaceSort::MostReviewed),
            other => Err(DomainError::parse(format!(
                "Unknown sort '{}', expected top, latest or most_reviewed",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

/// A trailing URL segment of the form `<name>-<id>` naming a spot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotNameId {
    pub slug: String,
    pub id: PlaceId,
}

impl SpotNameId {
    /// `"blue-hole-42"` -> slug `blue-hole`, id 42. Returns `None` when the
    /// segment does not end in a positive integer preceded by a name.
    pub fn parse(segment: &str) -> Option<Self> {
        let (slug, id) = segment.rsplit_once('-')?;
        if slug.is_empty() {
            return None;
        }
        let id: i64 = id.parse().ok()?;
        if id <= 0 {
            return None;
        }
        Some(Self {
            slug: slug.to_lowercase(),
            id: PlaceId::new(id),
        })
    }

    /// Whether `place` is the spot this segment names.
    pub fn matches(&self, place: &Place) -> bool {
        place.kind == PlaceKind::Spot
            && place.id == self.id
            && place.slug().is_some_and(|slug| slug.as_str() == self.slug)
    }
}
