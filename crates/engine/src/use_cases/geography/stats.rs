use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use divemap_domain::{AdminLevel, GeoPath, NodeId, NodeName, PlaceKind, ShortName};

use super::{CollectDescendants, GeographyError, ResolvePath};
use crate::infrastructure::ports::{NodeRepo, PlaceRepo};

/// Spot and shop totals of one child subtree.
#[derive(Debug, Clone, Serialize)]
pub struct BranchStats {
    pub id: NodeId,
    pub name: NodeName,
    pub short_name: ShortName,
    pub admin_level: AdminLevel,
    pub spot_count: i64,
    pub shop_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub id: NodeId,
    pub name: NodeName,
    pub path: GeoPath,
    pub admin_level: AdminLevel,
    pub spot_count: i64,
    pub shop_count: i64,
    pub children: Vec<BranchStats>,
}

/// Counts under a node plus a per-child breakdown.
pub struct GeographyStats {
    resolve: Arc<ResolvePath>,
    descendants: Arc<CollectDescendants>,
    nodes: Arc<dyn NodeRepo>,
    places: Arc<dyn PlaceRepo>,
}

impl GeographyStats {
    pub fn new(
        resolve: Arc<ResolvePath>,
        descendants: Arc<CollectDescendants>,
        nodes: Arc<dyn NodeRepo>,
        places: Arc<dyn PlaceRepo>,
    ) -> Self {
        Self {
            resolve,
            descendants,
            nodes,
            places,
        }
    }

    pub async fn execute(&self, path: &GeoPath) -> Result<NodeStats, GeographyError> {
        let node = self.resolve.execute(path).await?;
        let scope = self.descendants.execute(node.id).await?;
        let spot_count = self.places.count_in_nodes(PlaceKind::Spot, &scope).await?;
        let shop_count = self.places.count_in_nodes(PlaceKind::Shop, &scope).await?;

        let branches: HashMap<NodeId, (i64, i64)> = self
            .places
            .count_by_branch(node.id)
            .await?
            .into_iter()
            .map(|b| (b.child_id, (b.spot_count, b.shop_count)))
            .collect();

        // Children without places are listed with zero counts.
        let children = self
            .nodes
            .list_children(node.id)
            .await?
            .into_iter()
            .map(|child| {
                let (spots, shops) = branches.get(&child.id).copied().unwrap_or_default();
                BranchStats {
                    id: child.id,
                    name: child.name,
                    short_name: child.short_name,
                    admin_level: child.admin_level,
                    spot_count: spots,
                    shop_count: shops,
                }
            })
            .collect();

        Ok(NodeStats {
            id: node.id,
            name: node.name,
            path: path.clone(),
            admin_level: node.admin_level,
            spot_count,
            shop_count,
            children,
        })
    }
}
