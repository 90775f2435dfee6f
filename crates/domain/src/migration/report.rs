//! MigrationReport - structured outcome of one migrator run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{LegacyId, MigrationRunId, NodeId};
use crate::tree::{ChainBreak, TreeViolation};
use crate::value_objects::AdminLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Plan only; nothing is written.
    DryRun,
    Apply,
}

impl MigrationMode {
    pub fn is_apply(self) -> bool {
        self == MigrationMode::Apply
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationMode::DryRun => write!(f, "dry-run"),
            MigrationMode::Apply => write!(f, "apply"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    CreateNodes,
    AssignParents,
    AssignRoots,
    MergeDuplicates,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationPhase::CreateNodes => "create_nodes",
            MigrationPhase::AssignParents => "assign_parents",
            MigrationPhase::AssignRoots => "assign_roots",
            MigrationPhase::MergeDuplicates => "merge_duplicates",
        };
        f.write_str(name)
    }
}

/// A row in one of the legacy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegacyRef {
    pub level: AdminLevel,
    pub id: LegacyId,
}

impl LegacyRef {
    pub fn new(level: AdminLevel, id: LegacyId) -> Self {
        Self { level, id }
    }
}

impl fmt::Display for LegacyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.level.legacy_name(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The legacy row cannot become a node (bad name or short name).
    InvalidLegacyRow { message: String },
    /// The node carries no legacy id for the level above it.
    MissingParentLink { parent_level: AdminLevel },
    /// The referenced legacy parent has no node.
    MissingParentNode { parent: LegacyRef },
    /// The parent already has a child with this short name.
    DuplicatePathSegment {
        parent_id: Option<NodeId>,
        short_name: String,
    },
    BrokenChain { cause: ChainBreak },
    DependentRowsRemain { count: i64 },
    /// The store refused a write for another reason.
    Store { message: String },
    /// Merges were still happening when the run stopped re-planning.
    PassLimitReached { passes: u32 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidLegacyRow { message } => write!(f, "invalid legacy row: {}", message),
            FailureReason::MissingParentLink { parent_level } => {
                write!(f, "no legacy {} id", parent_level.legacy_name())
            }
            FailureReason::MissingParentNode { parent } => write!(f, "no node for {}", parent),
            FailureReason::DuplicatePathSegment {
                parent_id: Some(parent_id),
                short_name,
            } => write!(f, "node {} already has a child '{}'", parent_id, short_name),
            FailureReason::DuplicatePathSegment {
                parent_id: None,
                short_name,
            } => write!(f, "a country '{}' already exists", short_name),
            FailureReason::BrokenChain { cause } => write!(f, "broken chain: {}", cause),
            FailureReason::DependentRowsRemain { count } => {
                write!(f, "{} dependent rows remain", count)
            }
            FailureReason::Store { message } => write!(f, "store error: {}", message),
            FailureReason::PassLimitReached { passes } => {
                write!(f, "still merging after {} passes", passes)
            }
        }
    }
}

/// One node or legacy row the run could not process, or the run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub phase: MigrationPhase,
    pub node_id: Option<NodeId>,
    pub legacy: Option<LegacyRef>,
    pub reason: FailureReason,
}

impl MigrationFailure {
    pub fn for_node(phase: MigrationPhase, node_id: NodeId, reason: FailureReason) -> Self {
        Self {
            phase,
            node_id: Some(node_id),
            legacy: None,
            reason,
        }
    }

    pub fn for_legacy(phase: MigrationPhase, legacy: LegacyRef, reason: FailureReason) -> Self {
        Self {
            phase,
            node_id: None,
            legacy: Some(legacy),
            reason,
        }
    }

    /// A failure of the run as a whole rather than of one item.
    pub fn for_run(phase: MigrationPhase, reason: FailureReason) -> Self {
        Self {
            phase,
            node_id: None,
            legacy: None,
            reason,
        }
    }
}

/// Legacy rows of one table sharing `(short_name, parent legacy id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub level: AdminLevel,
    pub short_name: String,
    pub parent_legacy_id: Option<LegacyId>,
    /// Lowest id of the group.
    pub canonical: LegacyId,
    pub duplicates: Vec<LegacyId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounts {
    pub nodes_created: u64,
    pub rows_already_mapped: u64,
    pub parents_assigned: u64,
    pub roots_assigned: u64,
    pub legacy_rows_merged: u64,
    pub nodes_collapsed: u64,
    pub children_detached: u64,
    pub spots_repointed: u64,
    pub shops_repointed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub run_id: MigrationRunId,
    pub mode: MigrationMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of create/parent/root passes; more than one when a merge
    /// triggered a re-run.
    pub passes: u32,
    pub counts: MigrationCounts,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub failures: Vec<MigrationFailure>,
    pub violations: Vec<TreeViolation>,
}

impl MigrationReport {
    pub fn new(mode: MigrationMode, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: MigrationRunId::new(),
            mode,
            started_at,
            finished_at: None,
            passes: 0,
            counts: MigrationCounts::default(),
            duplicate_groups: Vec::new(),
            failures: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn fail(&mut self, failure: MigrationFailure) {
        self.failures.push(failure);
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>, violations: Vec<TreeViolation>) {
        self.finished_at = Some(finished_at);
        self.violations = violations;
    }

    /// No failures and a consistent forest.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.violations.is_empty()
    }

    pub fn failures_in(&self, phase: MigrationPhase) -> impl Iterator<Item = &MigrationFailure> {
        self.failures.iter().filter(move |f| f.phase == phase)
    }
}
