//! Path resolver: URL segments to a node, parent-scoped at every level.

use std::sync::Arc;

use divemap_domain::{AdminLevel, GeoPath, GeographicNode, NodeId};

use super::GeographyError;
use crate::infrastructure::ports::NodeRepo;

pub struct ResolvePath {
    nodes: Arc<dyn NodeRepo>,
}

impl ResolvePath {
    pub fn new(nodes: Arc<dyn NodeRepo>) -> Self {
        Self { nodes }
    }

    /// Segment `i` must name a child of the node found for segment `i - 1`
    /// at `admin_level == i`. A miss anywhere is `NotFound`; same-named
    /// nodes elsewhere in the tree are never considered.
    pub async fn execute(&self, path: &GeoPath) -> Result<GeographicNode, GeographyError> {
        let not_found = || GeographyError::NotFound(format!("No location at /{}", path));

        let segments = path.segments();
        if segments.len() > AdminLevel::ALL.len() {
            return Err(not_found());
        }

        let mut current = self
            .nodes
            .find_root(&segments[0])
            .await?
            .ok_or_else(not_found)?;
        for (segment, level) in segments[1..].iter().zip(AdminLevel::ALL.into_iter().skip(1)) {
            current = self
                .nodes
                .find_child(current.id, segment, level)
                .await?
                .ok_or_else(not_found)?;
        }

        tracing::debug!(path = %path, node_id = %current.id, "Resolved geographic path");
        Ok(current)
    }

    /// Path of an existing node, rebuilt from its ancestor chain. `None` when
    /// the chain does not reach a country (a node still awaiting its parent).
    pub async fn path_of(&self, id: NodeId) -> Result<Option<GeoPath>, GeographyError> {
        let chain = self.nodes.ancestors(id).await?;
        let reaches_root = chain
            .first()
            .is_some_and(|top| top.is_root() && top.parent_id.is_none());
        if !reaches_root {
            return Ok(None);
        }
        let path = GeoPath::from_segments(chain.iter().map(|node| node.short_name.to_string()))?;
        Ok(Some(path))
    }
}
