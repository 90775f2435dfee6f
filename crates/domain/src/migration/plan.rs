//! Pure planning steps of the hierarchy migration.
//!
//! Each function looks at a snapshot (legacy rows, current nodes) and says
//! what the phase would write. The engine applies the plan to the store, or
//! to an in-memory copy for a dry run.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::entities::{GeographicNode, LegacyRow, NewGeographicNode};
use crate::ids::{LegacyId, NodeId};
use crate::tree::NodeIndex;
use crate::value_objects::{AdminLevel, NodeName, ShortName};

use super::report::{DuplicateGroup, FailureReason, LegacyRef, MigrationFailure, MigrationPhase};

/// A node phase 1 will create for a legacy row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNode {
    pub source: LegacyRef,
    pub node: NewGeographicNode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreationPlan {
    /// In level order, ascending legacy id within a level.
    pub nodes: Vec<PlannedNode>,
    /// Rows that already have a node.
    pub already_mapped: Vec<LegacyRef>,
    /// Rows sharing a key with an earlier row; they get no node and are
    /// folded into the earlier row by the merge phase.
    pub deferred_duplicates: Vec<LegacyRef>,
    pub failures: Vec<MigrationFailure>,
}

/// Phase 1: one node per unique `(level, short_name, parent legacy id)`.
///
/// Rows are visited in ascending id order so the first row seen for a key
/// is also the lowest id, the one the merge phase keeps. Keys of rows that
/// already have a node count as seen.
pub fn plan_node_creation(rows: &[LegacyRow], existing: &[GeographicNode]) -> CreationPlan {
    let mut plan = CreationPlan::default();

    let mapped: HashSet<LegacyRef> = existing
        .iter()
        .filter_map(|n| {
            n.legacy
                .get(n.admin_level)
                .map(|id| LegacyRef::new(n.admin_level, id))
        })
        .collect();
    // Keyed off the rows rather than the nodes, so every deferred row has a
    // partner with the same key for phase 4 to merge it into.
    let mut seen: HashSet<(AdminLevel, String, Option<LegacyId>)> = rows
        .iter()
        .filter(|r| mapped.contains(&LegacyRef::new(r.level, r.id)))
        .map(LegacyRow::dedup_key)
        .collect();
    let mut country_names: HashSet<String> = existing
        .iter()
        .filter(|n| n.is_root())
        .map(|n| n.short_name.to_string())
        .collect();

    let mut ordered: Vec<&LegacyRow> = rows.iter().collect();
    ordered.sort_by_key(|r| (r.level, r.id));

    for row in ordered {
        let source = LegacyRef::new(row.level, row.id);
        if mapped.contains(&source) {
            plan.already_mapped.push(source);
            continue;
        }
        if !seen.insert(row.dedup_key()) {
            plan.deferred_duplicates.push(source);
            continue;
        }

        let node = match node_for_row(row) {
            Ok(node) => node,
            Err(message) => {
                plan.failures.push(MigrationFailure::for_legacy(
                    MigrationPhase::CreateNodes,
                    source,
                    FailureReason::InvalidLegacyRow { message },
                ));
                continue;
            }
        };
        if node.admin_level == AdminLevel::Country
            && !country_names.insert(node.short_name.to_string())
        {
            plan.failures.push(MigrationFailure::for_legacy(
                MigrationPhase::CreateNodes,
                source,
                FailureReason::DuplicatePathSegment {
                    parent_id: None,
                    short_name: node.short_name.to_string(),
                },
            ));
            continue;
        }
        plan.nodes.push(PlannedNode { source, node });
    }

    plan
}

fn node_for_row(row: &LegacyRow) -> Result<NewGeographicNode, String> {
    let name = NodeName::new(row.name.as_str()).map_err(|e| e.to_string())?;
    let short_name = row.node_short_name().map_err(|e| e.to_string())?;
    Ok(NewGeographicNode::unlinked(name, short_name, row.level).with_legacy(row.linkage()))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentPlan {
    /// `(node, target)` pairs: a parent in phase 2, a root in phase 3.
    pub assignments: Vec<(NodeId, NodeId)>,
    pub failures: Vec<MigrationFailure>,
}

/// Phase 2: link unparented nodes to the node of their legacy parent row.
///
/// Levels are handled top-down. Nodes that already have a parent are left
/// alone. An assignment that would give a parent two children with the same
/// short name is refused and reported.
pub fn plan_parent_assignments(nodes: &[GeographicNode]) -> AssignmentPlan {
    let mut plan = AssignmentPlan::default();

    // Lowest node id wins if two nodes claim the same legacy row.
    let mut by_legacy: HashMap<LegacyRef, NodeId> = HashMap::new();
    let mut sorted: Vec<&GeographicNode> = nodes.iter().collect();
    sorted.sort_by_key(|n| (n.admin_level, n.id));
    for node in &sorted {
        if let Some(id) = node.legacy.get(node.admin_level) {
            by_legacy
                .entry(LegacyRef::new(node.admin_level, id))
                .or_insert(node.id);
        }
    }

    let mut occupied: HashSet<(NodeId, &ShortName)> = nodes
        .iter()
        .filter_map(|n| n.parent_id.map(|p| (p, &n.short_name)))
        .collect();

    for node in sorted {
        let Some(parent_level) = node.admin_level.parent() else {
            continue;
        };
        if node.parent_id.is_some() {
            continue;
        }
        let fail =
            |reason| MigrationFailure::for_node(MigrationPhase::AssignParents, node.id, reason);

        let Some(parent_legacy) = node.legacy.get(parent_level) else {
            plan.failures
                .push(fail(FailureReason::MissingParentLink { parent_level }));
            continue;
        };
        let parent_ref = LegacyRef::new(parent_level, parent_legacy);
        let Some(&parent_id) = by_legacy.get(&parent_ref) else {
            plan.failures
                .push(fail(FailureReason::MissingParentNode { parent: parent_ref }));
            continue;
        };
        if !occupied.insert((parent_id, &node.short_name)) {
            plan.failures.push(fail(FailureReason::DuplicatePathSegment {
                parent_id: Some(parent_id),
                short_name: node.short_name.to_string(),
            }));
            continue;
        }
        plan.assignments.push((node.id, parent_id));
    }

    plan
}

/// Phase 3: every node whose `root_id` differs from the country its parent
/// chain reaches gets that country. Chains that do not reach a country are
/// reported; the node's root is left as is.
pub fn plan_root_assignments(nodes: &[GeographicNode]) -> AssignmentPlan {
    let mut plan = AssignmentPlan::default();
    let index = NodeIndex::new(nodes);

    let mut sorted: Vec<&GeographicNode> = nodes.iter().collect();
    sorted.sort_by_key(|n| (n.admin_level, n.id));
    for node in sorted {
        match index.root_of(node) {
            Ok(root) if node.root_id != Some(root.id) => {
                plan.assignments.push((node.id, root.id));
            }
            Ok(_) => {}
            Err(cause) => plan.failures.push(MigrationFailure::for_node(
                MigrationPhase::AssignRoots,
                node.id,
                FailureReason::BrokenChain { cause },
            )),
        }
    }

    plan
}

/// Phase 4 input: duplicate groups per legacy table, top level first, the
/// lowest id of each group being canonical.
pub fn plan_legacy_merges(rows: &[LegacyRow]) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<(AdminLevel, String, Option<LegacyId>), Vec<LegacyId>> =
        BTreeMap::new();
    for row in rows {
        groups.entry(row.dedup_key()).or_default().push(row.id);
    }

    let mut result: Vec<DuplicateGroup> = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((level, short_name, parent_legacy_id), mut ids)| {
            ids.sort();
            let canonical = ids.remove(0);
            DuplicateGroup {
                level,
                short_name,
                parent_legacy_id,
                canonical,
                duplicates: ids,
            }
        })
        .collect();
    result.sort_by_key(|g| (g.level, g.canonical));
    result
}

/// Apply `(node, parent)` pairs to an in-memory snapshot.
pub fn apply_parents(nodes: &mut [GeographicNode], assignments: &[(NodeId, NodeId)]) {
    let targets: HashMap<NodeId, NodeId> = assignments.iter().copied().collect();
    for node in nodes.iter_mut() {
        if let Some(parent) = targets.get(&node.id) {
            node.parent_id = Some(*parent);
        }
    }
}

/// Apply `(node, root)` pairs to an in-memory snapshot.
pub fn apply_roots(nodes: &mut [GeographicNode], assignments: &[(NodeId, NodeId)]) {
    let targets: HashMap<NodeId, NodeId> = assignments.iter().copied().collect();
    for node in nodes.iter_mut() {
        if let Some(root) = targets.get(&node.id) {
            node.root_id = Some(*root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::test_support::linked;
    use crate::tree::verify_forest;
    use chrono::{TimeZone, Utc};

    fn row(level: AdminLevel, id: i64, short: &str, parents: &[i64]) -> LegacyRow {
        let fk = |i: usize| parents.get(i).copied().map(LegacyId::new);
        LegacyRow {
            level,
            id: LegacyId::new(id),
            name: short.to_uppercase(),
            short_name: short.to_string(),
            country_id: fk(0),
            area_one_id: fk(1),
            area_two_id: fk(2),
        }
    }

    fn legacy_rows() -> Vec<LegacyRow> {
        vec![
            row(AdminLevel::Country, 1, "us", &[]),
            row(AdminLevel::Country, 2, "ge", &[]),
            row(AdminLevel::State, 5, "ca", &[1]),
            row(AdminLevel::State, 6, "ge", &[1]),
            row(AdminLevel::State, 8, "ca", &[1]),
            row(AdminLevel::County, 20, "la", &[1, 5]),
            row(AdminLevel::City, 30, "santa-monica", &[1, 5, 20]),
        ]
    }

    /// Materialize a creation plan with sequential ids, as a dry run does.
    fn materialize(plan: &CreationPlan) -> Vec<GeographicNode> {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        plan.nodes
            .iter()
            .enumerate()
            .map(|(i, p)| p.node.clone().into_node(NodeId::new(i as i64 + 1), at))
            .collect()
    }

    #[test]
    fn creation_dedupes_by_parent_scoped_short_name() {
        let plan = plan_node_creation(&legacy_rows(), &[]);

        let sources: Vec<_> = plan.nodes.iter().map(|p| p.source.id.get()).collect();
        assert_eq!(sources, vec![1, 2, 5, 6, 20, 30]);
        assert_eq!(
            plan.deferred_duplicates,
            vec![LegacyRef::new(AdminLevel::State, LegacyId::new(8))]
        );
        // "ge" as a country and as a state do not collide.
        assert!(plan.failures.is_empty());
    }

    #[test]
    fn creation_skips_rows_already_mapped() {
        let first = plan_node_creation(&legacy_rows(), &[]);
        let existing = materialize(&first);

        let second = plan_node_creation(&legacy_rows(), &existing);
        assert!(second.nodes.is_empty());
        assert_eq!(second.already_mapped.len(), 6);
        assert_eq!(second.deferred_duplicates.len(), 1);
    }

    #[test]
    fn creation_reports_unusable_rows() {
        let rows = vec![row(AdminLevel::Country, 1, "!!!", &[])];
        let plan = plan_node_creation(&rows, &[]);
        assert!(plan.nodes.is_empty());
        assert!(matches!(
            plan.failures[0].reason,
            FailureReason::InvalidLegacyRow { .. }
        ));
    }

    #[test]
    fn creation_normalizes_legacy_short_names() {
        let rows = vec![row(AdminLevel::Country, 1, " US ", &[])];
        let plan = plan_node_creation(&rows, &[]);
        assert_eq!(plan.nodes[0].node.short_name.as_str(), "us");
    }

    #[test]
    fn slug_collision_with_mapped_row_is_merged_later() {
        let first = vec![row(AdminLevel::Country, 1, "United States", &[])];
        let existing = materialize(&plan_node_creation(&first, &[]));
        assert_eq!(existing[0].short_name.as_str(), "united-states");

        let mut rows = first;
        rows.push(row(AdminLevel::Country, 2, "united-states", &[]));
        let plan = plan_node_creation(&rows, &existing);
        assert!(plan.nodes.is_empty());
        assert!(plan.failures.is_empty());
        assert_eq!(
            plan.deferred_duplicates,
            vec![LegacyRef::new(AdminLevel::Country, LegacyId::new(2))]
        );

        let groups = plan_legacy_merges(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].short_name, "united-states");
        assert_eq!(groups[0].canonical, LegacyId::new(1));
        assert_eq!(groups[0].duplicates, vec![LegacyId::new(2)]);
    }

    #[test]
    fn full_plan_yields_consistent_forest() {
        let mut nodes = materialize(&plan_node_creation(&legacy_rows(), &[]));

        let parents = plan_parent_assignments(&nodes);
        assert!(parents.failures.is_empty(), "{:?}", parents.failures);
        apply_parents(&mut nodes, &parents.assignments);

        let roots = plan_root_assignments(&nodes);
        assert!(roots.failures.is_empty());
        apply_roots(&mut nodes, &roots.assignments);

        assert!(verify_forest(&nodes).is_empty());
        let sm = nodes.iter().find(|n| n.short_name.as_str() == "santa-monica").unwrap();
        assert_eq!(NodeIndex::new(&nodes).path_of(sm).unwrap().to_string(), "us/ca/la/santa-monica");
    }

    #[test]
    fn parent_assignment_reports_missing_parent_node() {
        // The county hangs off the deferred duplicate state 8.
        let mut rows = legacy_rows();
        rows.push(row(AdminLevel::County, 21, "sd", &[1, 8]));
        let nodes = materialize(&plan_node_creation(&rows, &[]));

        let plan = plan_parent_assignments(&nodes);
        assert_eq!(plan.failures.len(), 1);
        assert_eq!(
            plan.failures[0].reason,
            FailureReason::MissingParentNode {
                parent: LegacyRef::new(AdminLevel::State, LegacyId::new(8)),
            }
        );
    }

    #[test]
    fn parent_assignment_leaves_parented_nodes_alone() {
        let nodes = vec![
            linked(1, AdminLevel::Country, "us", None, Some(1)),
            linked(2, AdminLevel::State, "ca", Some(1), Some(1)),
        ];
        assert_eq!(plan_parent_assignments(&nodes), AssignmentPlan::default());
    }

    #[test]
    fn parent_assignment_refuses_sibling_collision() {
        let mut us = linked(1, AdminLevel::Country, "us", None, Some(1));
        us.legacy.country = Some(LegacyId::new(1));
        let mut ca = linked(2, AdminLevel::State, "ca", Some(1), Some(1));
        ca.legacy.country = Some(LegacyId::new(1));
        ca.legacy.area_one = Some(LegacyId::new(5));
        let mut other_ca = linked(3, AdminLevel::State, "ca", None, None);
        other_ca.legacy.country = Some(LegacyId::new(1));
        other_ca.legacy.area_one = Some(LegacyId::new(8));
        let mut orphan = linked(4, AdminLevel::County, "la", None, None);
        orphan.legacy.country = Some(LegacyId::new(1));

        let plan = plan_parent_assignments(&[us, ca, other_ca, orphan]);
        assert!(plan.assignments.is_empty());
        assert_eq!(
            plan.failures[0].reason,
            FailureReason::DuplicatePathSegment {
                parent_id: Some(NodeId::new(1)),
                short_name: "ca".into(),
            }
        );
        assert_eq!(
            plan.failures[1].reason,
            FailureReason::MissingParentLink {
                parent_level: AdminLevel::State
            }
        );
    }

    #[test]
    fn root_assignment_reports_broken_chains() {
        let nodes = vec![
            linked(1, AdminLevel::Country, "us", None, None),
            linked(2, AdminLevel::State, "ca", Some(1), None),
            linked(3, AdminLevel::County, "la", None, None),
        ];
        let plan = plan_root_assignments(&nodes);
        assert_eq!(
            plan.assignments,
            vec![(NodeId::new(1), NodeId::new(1)), (NodeId::new(2), NodeId::new(1))]
        );
        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.failures[0].node_id, Some(NodeId::new(3)));
    }

    #[test]
    fn merge_groups_pick_lowest_id() {
        let mut rows = legacy_rows();
        rows.push(row(AdminLevel::State, 3, "CA", &[1]));
        let groups = plan_legacy_merges(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical, LegacyId::new(3));
        assert_eq!(groups[0].duplicates, vec![LegacyId::new(5), LegacyId::new(8)]);
        assert_eq!(groups[0].parent_legacy_id, Some(LegacyId::new(1)));
    }

    #[test]
    fn same_short_name_under_different_parents_is_not_a_duplicate() {
        let rows = vec![
            row(AdminLevel::State, 5, "ca", &[1]),
            row(AdminLevel::State, 9, "ca", &[2]),
        ];
        assert!(plan_legacy_merges(&rows).is_empty());
    }
}
