//! Legacy-table to node-tree migration: pure planning and the run report.
//!
//! Phases, in order:
//! 1. create one node per distinct legacy row
//! 2. assign parents from legacy foreign keys
//! 3. assign roots by walking parent chains
//! 4. merge duplicate legacy rows (and their nodes), then repeat 1-3

mod plan;
mod report;

pub use plan::{
    apply_parents, apply_roots, plan_legacy_merges, plan_node_creation, plan_parent_assignments,
    plan_root_assignments, AssignmentPlan, CreationPlan, PlannedNode,
};
pub use report::{
    DuplicateGroup, FailureReason, LegacyRef, MigrationCounts, MigrationFailure, MigrationMode,
    MigrationPhase, MigrationReport,
};
