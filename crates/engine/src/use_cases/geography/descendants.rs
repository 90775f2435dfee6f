use std::collections::HashSet;
use std::sync::Arc;

use divemap_domain::NodeId;

use super::GeographyError;
use crate::infrastructure::ports::NodeRepo;

/// Closure of a node: the node itself plus every transitive descendant.
pub struct CollectDescendants {
    nodes: Arc<dyn NodeRepo>,
}

impl CollectDescendants {
    pub fn new(nodes: Arc<dyn NodeRepo>) -> Self {
        Self { nodes }
    }

    pub async fn execute(&self, id: NodeId) -> Result<HashSet<NodeId>, GeographyError> {
        let ids = self.nodes.descendant_ids(id).await?;
        tracing::debug!(node_id = %id, count = ids.len(), "Collected descendants");
        Ok(ids)
    }
}
