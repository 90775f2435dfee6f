//! Geography-scoped listings of spots and dive shops.
//!
//! A path that does not resolve to a node may still name a spot: the
//! trailing segment is then read as `<name>-<id>` and the segments before
//! it, if any, must resolve to a node whose subtree holds the spot.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use divemap_domain::{
    GeoPath, GeographicNode, NodeId, Page, Place, PlaceKind, PlaceSort, PlaceTypeFilter,
    SpotNameId,
};

use super::{CollectDescendants, GeographyError, ResolvePath};
use crate::infrastructure::config::PageLimits;
use crate::infrastructure::ports::PlaceRepo;

/// Listing parameters as parsed from the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub types: PlaceTypeFilter,
    pub sort: PlaceSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacePage {
    pub total: i64,
    pub items: Vec<Place>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceListing {
    pub node: GeographicNode,
    pub path: GeoPath,
    pub sort: PlaceSort,
    pub limit: u32,
    pub offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spots: Option<PlacePage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shops: Option<PlacePage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpotLookup {
    /// The location segments before the spot, if any.
    pub within: Option<GeoPath>,
    pub spot: Place,
}

/// What a `/loc/...` path turned out to name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocLookup {
    Listing(PlaceListing),
    Spot(SpotLookup),
}

pub struct ListPlaces {
    resolve: Arc<ResolvePath>,
    descendants: Arc<CollectDescendants>,
    places: Arc<dyn PlaceRepo>,
    page_limits: PageLimits,
}

impl ListPlaces {
    pub fn new(
        resolve: Arc<ResolvePath>,
        descendants: Arc<CollectDescendants>,
        places: Arc<dyn PlaceRepo>,
        page_limits: PageLimits,
    ) -> Self {
        Self {
            resolve,
            descendants,
            places,
            page_limits,
        }
    }

    pub async fn execute(
        &self,
        path: &GeoPath,
        query: ListingQuery,
    ) -> Result<LocLookup, GeographyError> {
        match self.resolve.execute(path).await {
            Ok(node) => self.list(node, path, query).await.map(LocLookup::Listing),
            Err(GeographyError::NotFound(message)) => self
                .spot_fallback(path)
                .await?
                .map(LocLookup::Spot)
                .ok_or(GeographyError::NotFound(message)),
            Err(other) => Err(other),
        }
    }

    async fn list(
        &self,
        node: GeographicNode,
        path: &GeoPath,
        query: ListingQuery,
    ) -> Result<PlaceListing, GeographyError> {
        let scope = self.descendants.execute(node.id).await?;
        let page = Page::new(self.page_limits.clamp(query.limit), query.offset);

        let spots = if query.types.includes(PlaceKind::Spot) {
            Some(self.page_of(PlaceKind::Spot, &scope, query.sort, page).await?)
        } else {
            None
        };
        let shops = if query.types.includes(PlaceKind::Shop) {
            Some(self.page_of(PlaceKind::Shop, &scope, query.sort, page).await?)
        } else {
            None
        };

        Ok(PlaceListing {
            node,
            path: path.clone(),
            sort: query.sort,
            limit: page.limit,
            offset: page.offset,
            spots,
            shops,
        })
    }

    async fn page_of(
        &self,
        kind: PlaceKind,
        scope: &HashSet<NodeId>,
        sort: PlaceSort,
        page: Page,
    ) -> Result<PlacePage, GeographyError> {
        let items = self.places.list_in_nodes(kind, scope, sort, page).await?;
        let total = self.places.count_in_nodes(kind, scope).await?;
        Ok(PlacePage { total, items })
    }

    /// `Ok(None)` when the path does not name a spot at all.
    async fn spot_fallback(&self, path: &GeoPath) -> Result<Option<SpotLookup>, GeographyError> {
        let Some(name_id) = SpotNameId::parse(path.last()) else {
            return Ok(None);
        };
        let Some(spot) = self.places.get(PlaceKind::Spot, name_id.id).await? else {
            return Ok(None);
        };
        if !name_id.matches(&spot) {
            return Ok(None);
        }

        let within = path.parent();
        if let Some(prefix) = &within {
            let container = match self.resolve.execute(prefix).await {
                Ok(node) => node,
                Err(GeographyError::NotFound(_)) => return Ok(None),
                Err(other) => return Err(other),
            };
            let scope = self.descendants.execute(container.id).await?;
            let contained = spot
                .geographic_node_id
                .is_some_and(|node_id| scope.contains(&node_id));
            if !contained {
                return Ok(None);
            }
        }

        tracing::debug!(path = %path, spot_id = %spot.id, "Path resolved to a spot");
        Ok(Some(SpotLookup { within, spot }))
    }
}
