// Port traits define the full contract - some methods only serve tests and tooling
#![allow(dead_code)]

//! Repository port traits for database access.

use async_trait::async_trait;
use std::collections::HashSet;

use divemap_domain::{
    AdminLevel, GeographicNode, LegacyId, LegacyRow, LegacyRowPatch, NewGeographicNode,
    NewLegacyRow, NewPlace, NodeId, Page, Place, PlaceId, PlaceKind, PlaceSort,
};

use super::error::RepoError;
use super::types::{BranchCount, CollapseOutcome, DependentCounts, LegacyMergeOutcome};

/// Outcome of each item of a batch write, in input order.
pub type BatchResult<T> = Vec<Result<T, RepoError>>;

// =============================================================================
// Node Store
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeRepo: Send + Sync {
    async fn get(&self, id: NodeId) -> Result<Option<GeographicNode>, RepoError>;

    /// Parentless country with this short name.
    async fn find_root(&self, short_name: &str) -> Result<Option<GeographicNode>, RepoError>;

    async fn find_child(
        &self,
        parent_id: NodeId,
        short_name: &str,
        level: AdminLevel,
    ) -> Result<Option<GeographicNode>, RepoError>;

    async fn list_children(&self, parent_id: NodeId) -> Result<Vec<GeographicNode>, RepoError>;
    async fn list_all(&self) -> Result<Vec<GeographicNode>, RepoError>;
    async fn list_by_level(&self, level: AdminLevel) -> Result<Vec<GeographicNode>, RepoError>;

    /// Node created for the legacy row `legacy_id` of the table at `level`.
    async fn find_by_legacy(
        &self,
        level: AdminLevel,
        legacy_id: LegacyId,
    ) -> Result<Option<GeographicNode>, RepoError>;

    /// The chain from the country down to `id`, inclusive. Stops early if a
    /// parent pointer is missing.
    async fn ancestors(&self, id: NodeId) -> Result<Vec<GeographicNode>, RepoError>;

    /// `id` plus every transitive descendant. Unknown id is `NotFound`.
    async fn descendant_ids(&self, id: NodeId) -> Result<HashSet<NodeId>, RepoError>;

    async fn insert(&self, node: &NewGeographicNode) -> Result<GeographicNode, RepoError>;

    /// Insert in one transaction; a failed item does not undo the others.
    async fn insert_batch(
        &self,
        nodes: &[NewGeographicNode],
    ) -> Result<BatchResult<GeographicNode>, RepoError>;

    /// Write the mutable fields (names, external refs, coordinates, country code).
    async fn update(&self, node: &GeographicNode) -> Result<(), RepoError>;

    /// `(node, parent)` pairs. The parent must be exactly one level up; the
    /// node's root is copied from it.
    async fn set_parents(
        &self,
        assignments: &[(NodeId, NodeId)],
    ) -> Result<BatchResult<()>, RepoError>;

    /// `(node, root)` pairs. The root must be a country.
    async fn set_roots(
        &self,
        assignments: &[(NodeId, NodeId)],
    ) -> Result<BatchResult<()>, RepoError>;

    /// Merge `duplicate` into `canonical` (same level) and delete it.
    async fn collapse_into(
        &self,
        duplicate: NodeId,
        canonical: NodeId,
    ) -> Result<CollapseOutcome, RepoError>;

    /// Refused with `DependentRowsRemain` while children, spots or shops
    /// reference the node.
    async fn delete(&self, id: NodeId) -> Result<(), RepoError>;
}

// =============================================================================
// Legacy flat tables
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LegacyRepo: Send + Sync {
    async fn list(&self, level: AdminLevel) -> Result<Vec<LegacyRow>, RepoError>;
    async fn list_all(&self) -> Result<Vec<LegacyRow>, RepoError>;
    async fn get(&self, level: AdminLevel, id: LegacyId) -> Result<Option<LegacyRow>, RepoError>;
    async fn insert(&self, row: &NewLegacyRow) -> Result<LegacyRow, RepoError>;

    async fn patch(
        &self,
        level: AdminLevel,
        id: LegacyId,
        patch: &LegacyRowPatch,
    ) -> Result<LegacyRow, RepoError>;

    async fn count_dependents(
        &self,
        level: AdminLevel,
        id: LegacyId,
    ) -> Result<DependentCounts, RepoError>;

    /// Repoint every reference to `duplicate` (lower legacy tables, spots,
    /// shops, node linkage) at `canonical`, then delete `duplicate` if
    /// nothing references it any more. One transaction.
    async fn merge_duplicate(
        &self,
        level: AdminLevel,
        duplicate: LegacyId,
        canonical: LegacyId,
    ) -> Result<LegacyMergeOutcome, RepoError>;

    /// Refused with `DependentRowsRemain` while anything references the row.
    async fn delete(&self, level: AdminLevel, id: LegacyId) -> Result<(), RepoError>;
}

// =============================================================================
// Spots and dive shops
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaceRepo: Send + Sync {
    async fn get(&self, kind: PlaceKind, id: PlaceId) -> Result<Option<Place>, RepoError>;
    async fn insert(&self, place: &NewPlace) -> Result<Place, RepoError>;

    /// Places whose node is in `node_ids`.
    async fn list_in_nodes(
        &self,
        kind: PlaceKind,
        node_ids: &HashSet<NodeId>,
        sort: PlaceSort,
        page: Page,
    ) -> Result<Vec<Place>, RepoError>;

    async fn count_in_nodes(
        &self,
        kind: PlaceKind,
        node_ids: &HashSet<NodeId>,
    ) -> Result<i64, RepoError>;

    /// Spot and shop counts for the subtree of each child of `node_id` that
    /// has any. One recursive query.
    async fn count_by_branch(&self, node_id: NodeId) -> Result<Vec<BranchCount>, RepoError>;
}
