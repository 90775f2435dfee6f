//! Value types returned by repository ports.

use divemap_domain::NodeId;
use serde::Serialize;

/// What `NodeRepo::collapse_into` moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollapseOutcome {
    /// Children re-parented onto the canonical node.
    pub moved_children: u64,
    /// Children whose short name was already taken under the canonical node.
    /// They are left unparented for the next parent-assignment pass.
    pub detached_children: u64,
    pub repointed_spots: u64,
    pub repointed_shops: u64,
}

/// Rows still referencing a legacy row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DependentCounts {
    pub legacy_rows: i64,
    pub spots: i64,
    pub shops: i64,
    pub nodes: i64,
}

impl DependentCounts {
    pub fn total(&self) -> i64 {
        self.legacy_rows + self.spots + self.shops + self.nodes
    }
}

/// What `LegacyRepo::merge_duplicate` repointed before deleting the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LegacyMergeOutcome {
    pub legacy_rows: u64,
    pub spots: u64,
    pub shops: u64,
    pub nodes: u64,
}

/// Spot and shop totals of one child subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchCount {
    pub child_id: NodeId,
    pub spot_count: i64,
    pub shop_count: i64,
}
