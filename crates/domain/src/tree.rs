//! In-memory checks over a set of nodes.
//!
//! The store enforces uniqueness and parent levels one write at a time; this
//! module re-derives the whole-forest properties from a snapshot so the
//! migrator can verify its result and plan root assignments.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::entities::GeographicNode;
use crate::ids::NodeId;
use crate::value_objects::{AdminLevel, GeoPath, ShortName};

/// Why a node's ancestor chain does not reach a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainBreak {
    /// A non-country node along the chain has no parent.
    NoParent { at: NodeId },
    /// A parent pointer references a node that is not in the snapshot.
    UnknownParent { at: NodeId, parent_id: NodeId },
    /// A parent is not exactly one level up.
    LevelMismatch {
        at: NodeId,
        parent_id: NodeId,
        level: AdminLevel,
        parent_level: AdminLevel,
    },
    /// A country has a parent.
    RootHasParent { at: NodeId, parent_id: NodeId },
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainBreak::NoParent { at } => write!(f, "node {} has no parent", at),
            ChainBreak::UnknownParent { at, parent_id } => {
                write!(f, "node {} points at missing parent {}", at, parent_id)
            }
            ChainBreak::LevelMismatch {
                at,
                parent_id,
                level,
                parent_level,
            } => write!(
                f,
                "node {} ({}) has parent {} at level {}",
                at, level, parent_id, parent_level
            ),
            ChainBreak::RootHasParent { at, parent_id } => {
                write!(f, "country {} has parent {}", at, parent_id)
            }
        }
    }
}

/// A violated forest property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeViolation {
    BrokenChain {
        node_id: NodeId,
        cause: ChainBreak,
    },
    RootIdMismatch {
        node_id: NodeId,
        expected: NodeId,
        actual: Option<NodeId>,
    },
    DuplicateSibling {
        parent_id: Option<NodeId>,
        short_name: ShortName,
        node_ids: Vec<NodeId>,
    },
}

/// Lookup table over a node snapshot.
pub struct NodeIndex<'a> {
    by_id: HashMap<NodeId, &'a GeographicNode>,
}

impl<'a> NodeIndex<'a> {
    pub fn new(nodes: &'a [GeographicNode]) -> Self {
        Self {
            by_id: nodes.iter().map(|n| (n.id, n)).collect(),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&'a GeographicNode> {
        self.by_id.get(&id).copied()
    }

    /// Walk parent pointers up to the country. Each step must climb exactly
    /// one level, so the walk takes `admin_level` steps and cannot loop.
    pub fn root_of(&self, node: &'a GeographicNode) -> Result<&'a GeographicNode, ChainBreak> {
        Ok(self.chain_of(node)?[0])
    }

    /// Ancestor chain, country first, ending with `node`.
    pub fn chain_of(
        &self,
        node: &'a GeographicNode,
    ) -> Result<Vec<&'a GeographicNode>, ChainBreak> {
        let mut chain = vec![node];
        let mut current = node;
        loop {
            match (current.admin_level.parent(), current.parent_id) {
                (None, None) => break,
                (None, Some(parent_id)) => {
                    return Err(ChainBreak::RootHasParent {
                        at: current.id,
                        parent_id,
                    })
                }
                (Some(_), None) => return Err(ChainBreak::NoParent { at: current.id }),
                (Some(expected), Some(parent_id)) => {
                    let parent = self.get(parent_id).ok_or(ChainBreak::UnknownParent {
                        at: current.id,
                        parent_id,
                    })?;
                    if parent.admin_level != expected {
                        return Err(ChainBreak::LevelMismatch {
                            at: current.id,
                            parent_id,
                            level: current.admin_level,
                            parent_level: parent.admin_level,
                        });
                    }
                    chain.push(parent);
                    current = parent;
                }
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// The resolvable URL path of `node`, built from its ancestors' short names.
    pub fn path_of(&self, node: &'a GeographicNode) -> Result<GeoPath, ChainBreak> {
        let chain = self.chain_of(node)?;
        let mut path = GeoPath::single(chain[0].short_name.as_str());
        for ancestor in &chain[1..] {
            path = path.child(ancestor.short_name.as_str());
        }
        Ok(path)
    }
}

/// Check every forest property over `nodes`:
///
/// - countries have no parent and `root_id == id`
/// - every other node reaches a country through parents one level apart, in
///   exactly `admin_level` steps, and `root_id` names that country
/// - no two children of a parent (and no two countries) share a short name
pub fn verify_forest(nodes: &[GeographicNode]) -> Vec<TreeViolation> {
    let index = NodeIndex::new(nodes);
    let mut violations = Vec::new();

    for node in nodes {
        match index.root_of(node) {
            Ok(root) => {
                if node.root_id != Some(root.id) {
                    violations.push(TreeViolation::RootIdMismatch {
                        node_id: node.id,
                        expected: root.id,
                        actual: node.root_id,
                    });
                }
            }
            Err(cause) => violations.push(TreeViolation::BrokenChain {
                node_id: node.id,
                cause,
            }),
        }
    }

    let mut siblings: HashMap<(Option<NodeId>, &ShortName), Vec<NodeId>> = HashMap::new();
    for node in nodes {
        // Unparented non-countries are reported as broken chains above.
        if node.parent_id.is_some() || node.is_root() {
            siblings
                .entry((node.parent_id, &node.short_name))
                .or_default()
                .push(node.id);
        }
    }
    let mut duplicates: Vec<_> = siblings
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((parent_id, short_name), mut node_ids)| {
            node_ids.sort();
            TreeViolation::DuplicateSibling {
                parent_id,
                short_name: short_name.clone(),
                node_ids,
            }
        })
        .collect();
    duplicates.sort_by_key(|v| match v {
        TreeViolation::DuplicateSibling { node_ids, .. } => node_ids.first().copied(),
        _ => None,
    });
    violations.extend(duplicates);

    violations
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use crate::entities::{GeographicNode, NewGeographicNode};
    use crate::ids::NodeId;
    use crate::value_objects::{AdminLevel, NodeName, ShortName};

    /// Node with parent and root already linked.
    pub fn linked(
        id: i64,
        level: AdminLevel,
        short: &str,
        parent: Option<i64>,
        root: Option<i64>,
    ) -> GeographicNode {
        let mut node = NewGeographicNode::unlinked(
            NodeName::new(short).unwrap(),
            ShortName::new(short).unwrap(),
            level,
        )
        .into_node(
            NodeId::new(id),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        node.parent_id = parent.map(NodeId::new);
        node.root_id = root.map(NodeId::new);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::linked;
    use super::*;

    fn sample_forest() -> Vec<GeographicNode> {
        vec![
            linked(1, AdminLevel::Country, "us", None, Some(1)),
            linked(2, AdminLevel::State, "ca", Some(1), Some(1)),
            linked(3, AdminLevel::County, "la", Some(2), Some(1)),
            linked(4, AdminLevel::City, "santa-monica", Some(3), Some(1)),
            linked(5, AdminLevel::State, "ge", Some(1), Some(1)),
            linked(6, AdminLevel::Country, "ge", None, Some(6)),
        ]
    }

    #[test]
    fn consistent_forest_has_no_violations() {
        assert!(verify_forest(&sample_forest()).is_empty());
    }

    #[test]
    fn chain_walk_takes_admin_level_steps() {
        let nodes = sample_forest();
        let index = NodeIndex::new(&nodes);
        for node in &nodes {
            let chain = index.chain_of(node).unwrap();
            assert_eq!(chain.len(), node.admin_level.depth() as usize + 1);
            assert_eq!(Some(chain[0].id), node.root_id);
        }
    }

    #[test]
    fn path_of_builds_from_short_names() {
        let nodes = sample_forest();
        let index = NodeIndex::new(&nodes);
        let path = index.path_of(&nodes[3]).unwrap();
        assert_eq!(path.to_string(), "us/ca/la/santa-monica");
    }

    #[test]
    fn detects_wrong_root_id() {
        let mut nodes = sample_forest();
        nodes[3].root_id = Some(NodeId::new(6));
        let violations = verify_forest(&nodes);
        assert_eq!(
            violations,
            vec![TreeViolation::RootIdMismatch {
                node_id: NodeId::new(4),
                expected: NodeId::new(1),
                actual: Some(NodeId::new(6)),
            }]
        );
    }

    #[test]
    fn detects_level_skip() {
        let mut nodes = sample_forest();
        nodes[3].parent_id = Some(NodeId::new(2));
        let violations = verify_forest(&nodes);
        assert!(matches!(
            violations[0],
            TreeViolation::BrokenChain {
                cause: ChainBreak::LevelMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn detects_unparented_and_dangling_nodes() {
        let mut nodes = sample_forest();
        nodes[1].parent_id = None;
        nodes[4].parent_id = Some(NodeId::new(99));
        let violations = verify_forest(&nodes);

        let broken: Vec<_> = violations
            .iter()
            .filter_map(|v| match v {
                TreeViolation::BrokenChain { node_id, .. } => Some(node_id.get()),
                _ => None,
            })
            .collect();
        // ca lost its parent, so la and santa-monica below it are broken too.
        assert_eq!(broken, vec![2, 3, 4, 5]);
    }

    #[test]
    fn detects_duplicate_siblings_but_not_cousins() {
        let mut nodes = sample_forest();
        nodes.push(linked(7, AdminLevel::State, "ca", Some(1), Some(1)));
        nodes.push(linked(8, AdminLevel::State, "ca", Some(6), Some(6)));
        let violations = verify_forest(&nodes);
        assert_eq!(
            violations,
            vec![TreeViolation::DuplicateSibling {
                parent_id: Some(NodeId::new(1)),
                short_name: ShortName::new("ca").unwrap(),
                node_ids: vec![NodeId::new(2), NodeId::new(7)],
            }]
        );
    }

    #[test]
    fn duplicate_countries_are_reported() {
        let mut nodes = sample_forest();
        nodes.push(linked(9, AdminLevel::Country, "us", None, Some(9)));
        let violations = verify_forest(&nodes);
        assert!(matches!(
            &violations[0],
            TreeViolation::DuplicateSibling { parent_id: None, .. }
        ));
    }
}
