//! Hierarchy migrator: the four migration phases against the stores.
//!
//! Planning is pure (see `divemap_domain::migration`); this module loads
//! snapshots, feeds them to the planners and either writes the plans
//! (`Apply`) or replays them on an in-memory copy (`DryRun`). Per-item
//! failures go into the report and the run carries on; only failures to
//! read a snapshot abort it.

use std::sync::Arc;

use divemap_domain::migration::{
    apply_parents, apply_roots, plan_legacy_merges, plan_node_creation, plan_parent_assignments,
    plan_root_assignments,
};
use divemap_domain::{
    verify_forest, AdminLevel, FailureReason, LegacyRef, MigrationFailure, MigrationMode,
    MigrationPhase, MigrationReport, NewGeographicNode, NodeId, TreeViolation,
};

use crate::infrastructure::ports::{ClockPort, LegacyRepo, NodeRepo, RepoError};

/// Upper bound on create/parent/root passes. Each extra pass only happens
/// after a merge changed something.
pub const MAX_PASSES: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

pub struct HierarchyMigrator {
    nodes: Arc<dyn NodeRepo>,
    legacy: Arc<dyn LegacyRepo>,
    clock: Arc<dyn ClockPort>,
}

impl HierarchyMigrator {
    pub fn new(
        nodes: Arc<dyn NodeRepo>,
        legacy: Arc<dyn LegacyRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            nodes,
            legacy,
            clock,
        }
    }

    pub async fn run(&self, mode: MigrationMode) -> Result<MigrationReport, MigrationError> {
        let mut report = MigrationReport::new(mode, self.clock.now());
        tracing::info!(run_id = %report.run_id, mode = %mode, "Starting hierarchy migration");

        let violations = match mode {
            MigrationMode::DryRun => self.simulate(&mut report).await?,
            MigrationMode::Apply => {
                self.apply(&mut report).await?;
                verify_forest(&self.nodes.list_all().await?)
            }
        };
        report.finish(self.clock.now(), violations);

        if report.is_clean() {
            tracing::info!(
                run_id = %report.run_id,
                passes = report.passes,
                nodes_created = report.counts.nodes_created,
                legacy_rows_merged = report.counts.legacy_rows_merged,
                "Hierarchy migration finished"
            );
        } else {
            tracing::warn!(
                run_id = %report.run_id,
                passes = report.passes,
                failures = report.failures.len(),
                violations = report.violations.len(),
                "Hierarchy migration finished with problems"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // Apply
    // =========================================================================

    async fn apply(&self, report: &mut MigrationReport) -> Result<(), MigrationError> {
        loop {
            report.passes += 1;
            // Each pass re-plans from the current state, so earlier
            // failures are either repeated or resolved.
            report.failures.clear();
            report.duplicate_groups.clear();

            self.create_nodes(report).await?;
            self.assign_parents(report).await?;
            self.assign_roots(report).await?;
            let merged = self.merge_duplicates(report).await?;

            if merged == 0 {
                break;
            }
            if report.passes >= MAX_PASSES {
                tracing::warn!(
                    run_id = %report.run_id,
                    passes = report.passes,
                    "Stopping after maximum number of migration passes"
                );
                report.fail(MigrationFailure::for_run(
                    MigrationPhase::MergeDuplicates,
                    FailureReason::PassLimitReached {
                        passes: report.passes,
                    },
                ));
                break;
            }
            tracing::info!(
                run_id = %report.run_id,
                merged,
                "Legacy rows merged, re-running create/parent/root phases"
            );
        }
        Ok(())
    }

    async fn create_nodes(&self, report: &mut MigrationReport) -> Result<(), MigrationError> {
        let rows = self.legacy.list_all().await?;
        let existing = self.nodes.list_all().await?;
        let plan = plan_node_creation(&rows, &existing);

        if report.passes == 1 {
            report.counts.rows_already_mapped = plan.already_mapped.len() as u64;
        }
        report.failures.extend(plan.failures);
        if plan.nodes.is_empty() {
            return Ok(());
        }

        let batch: Vec<NewGeographicNode> = plan.nodes.iter().map(|p| p.node.clone()).collect();
        let results = self.nodes.insert_batch(&batch).await?;
        for (planned, result) in plan.nodes.iter().zip(results) {
            match result {
                Ok(_) => report.counts.nodes_created += 1,
                Err(e) => report.fail(MigrationFailure::for_legacy(
                    MigrationPhase::CreateNodes,
                    planned.source,
                    failure_reason(e),
                )),
            }
        }
        tracing::debug!(
            planned = batch.len(),
            created = report.counts.nodes_created,
            "Node creation phase done"
        );
        Ok(())
    }

    async fn assign_parents(&self, report: &mut MigrationReport) -> Result<(), MigrationError> {
        let nodes = self.nodes.list_all().await?;
        let plan = plan_parent_assignments(&nodes);
        report.failures.extend(plan.failures);
        if plan.assignments.is_empty() {
            return Ok(());
        }

        let results = self.nodes.set_parents(&plan.assignments).await?;
        record_assignments(
            report,
            MigrationPhase::AssignParents,
            &plan.assignments,
            results,
        );
        Ok(())
    }

    async fn assign_roots(&self, report: &mut MigrationReport) -> Result<(), MigrationError> {
        let nodes = self.nodes.list_all().await?;
        let plan = plan_root_assignments(&nodes);
        report.failures.extend(plan.failures);
        if plan.assignments.is_empty() {
            return Ok(());
        }

        let results = self.nodes.set_roots(&plan.assignments).await?;
        record_assignments(report, MigrationPhase::AssignRoots, &plan.assignments, results);
        Ok(())
    }

    /// Returns how many legacy rows were merged away.
    async fn merge_duplicates(&self, report: &mut MigrationReport) -> Result<u64, MigrationError> {
        let mut merged = 0;

        // Top level first: merging a parent row repoints the rows below it,
        // which can turn them into duplicates of each other.
        for level in AdminLevel::ALL {
            let rows = self.legacy.list(level).await?;
            let groups = plan_legacy_merges(&rows);

            for group in &groups {
                for &duplicate in &group.duplicates {
                    let source = LegacyRef::new(level, duplicate);
                    let fail = |reason| {
                        MigrationFailure::for_legacy(MigrationPhase::MergeDuplicates, source, reason)
                    };

                    let dup_node = self.nodes.find_by_legacy(level, duplicate).await?;
                    let canonical_node = self.nodes.find_by_legacy(level, group.canonical).await?;
                    if let (Some(dup), Some(canonical)) = (dup_node, canonical_node) {
                        if dup.id != canonical.id {
                            match self.nodes.collapse_into(dup.id, canonical.id).await {
                                Ok(outcome) => {
                                    report.counts.nodes_collapsed += 1;
                                    report.counts.children_detached += outcome.detached_children;
                                    report.counts.spots_repointed += outcome.repointed_spots;
                                    report.counts.shops_repointed += outcome.repointed_shops;
                                }
                                Err(e) => {
                                    report.fail(fail(failure_reason(e)));
                                    continue;
                                }
                            }
                        }
                    }

                    match self
                        .legacy
                        .merge_duplicate(level, duplicate, group.canonical)
                        .await
                    {
                        Ok(outcome) => {
                            merged += 1;
                            report.counts.legacy_rows_merged += 1;
                            report.counts.spots_repointed += outcome.spots;
                            report.counts.shops_repointed += outcome.shops;
                        }
                        Err(e) => report.fail(fail(failure_reason(e))),
                    }
                }
            }
            report.duplicate_groups.extend(groups);
        }

        Ok(merged)
    }

    // =========================================================================
    // Dry run
    // =========================================================================

    /// One pass of phases 1-3 on an in-memory copy, plus the duplicate
    /// groups phase 4 would merge. Nodes that would be created get negative
    /// placeholder ids.
    async fn simulate(
        &self,
        report: &mut MigrationReport,
    ) -> Result<Vec<TreeViolation>, MigrationError> {
        let rows = self.legacy.list_all().await?;
        let mut nodes = self.nodes.list_all().await?;
        let now = self.clock.now();
        report.passes = 1;

        let creation = plan_node_creation(&rows, &nodes);
        report.counts.rows_already_mapped = creation.already_mapped.len() as u64;
        report.counts.nodes_created = creation.nodes.len() as u64;
        report.failures.extend(creation.failures);
        for (placeholder, planned) in (1..).zip(creation.nodes) {
            nodes.push(planned.node.into_node(NodeId::new(-placeholder), now));
        }

        let parents = plan_parent_assignments(&nodes);
        apply_parents(&mut nodes, &parents.assignments);
        report.counts.parents_assigned = parents.assignments.len() as u64;
        report.failures.extend(parents.failures);

        let roots = plan_root_assignments(&nodes);
        apply_roots(&mut nodes, &roots.assignments);
        report.counts.roots_assigned = roots.assignments.len() as u64;
        report.failures.extend(roots.failures);

        let groups = plan_legacy_merges(&rows);
        report.counts.legacy_rows_merged = groups.iter().map(|g| g.duplicates.len() as u64).sum();
        report.duplicate_groups = groups;

        Ok(verify_forest(&nodes))
    }
}

fn record_assignments(
    report: &mut MigrationReport,
    phase: MigrationPhase,
    assignments: &[(NodeId, NodeId)],
    results: Vec<Result<(), RepoError>>,
) {
    for (&(node_id, _), result) in assignments.iter().zip(results) {
        match result {
            Ok(()) => match phase {
                MigrationPhase::AssignParents => report.counts.parents_assigned += 1,
                _ => report.counts.roots_assigned += 1,
            },
            Err(e) => report.fail(MigrationFailure::for_node(phase, node_id, failure_reason(e))),
        }
    }
}

fn failure_reason(err: RepoError) -> FailureReason {
    match err {
        RepoError::DuplicatePathSegment {
            parent_id,
            short_name,
        } => FailureReason::DuplicatePathSegment {
            parent_id,
            short_name,
        },
        RepoError::DependentRowsRemain { count, .. } => FailureReason::DependentRowsRemain { count },
        other => FailureReason::Store {
            message: other.to_string(),
        },
    }
}
