//! GeographicNode - one entry of the unified location tree
//!
//! # Invariants
//!
//! - A level-0 node has no parent and, once assigned, `root_id == id`.
//! - Any other node's parent sits exactly one `admin_level` higher, and its
//!   `root_id` is the level-0 node reached by following parents.
//! - `(parent_id, short_name)` is unique; parentless countries are unique by
//!   `short_name`. The store enforces this at write time.
//!
//! `parent_id` and `root_id` of non-root nodes are optional only because the
//! migrator creates a whole batch first and links it in later passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{LegacyId, NodeId};
use crate::value_objects::{AdminLevel, Coordinates, CountryCode, NodeName, ShortName};

/// Optional pointers back to the pre-migration flat-table rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegacyLinkage {
    #[serde(rename = "legacy_country_id")]
    pub country: Option<LegacyId>,
    #[serde(rename = "legacy_area_one_id")]
    pub area_one: Option<LegacyId>,
    #[serde(rename = "legacy_area_two_id")]
    pub area_two: Option<LegacyId>,
    #[serde(rename = "legacy_locality_id")]
    pub locality: Option<LegacyId>,
}

impl LegacyLinkage {
    pub fn get(&self, level: AdminLevel) -> Option<LegacyId> {
        match level {
            AdminLevel::Country => self.country,
            AdminLevel::State => self.area_one,
            AdminLevel::County => self.area_two,
            AdminLevel::City => self.locality,
        }
    }

    pub fn set(&mut self, level: AdminLevel, id: Option<LegacyId>) {
        match level {
            AdminLevel::Country => self.country = id,
            AdminLevel::State => self.area_one = id,
            AdminLevel::County => self.area_two = id,
            AdminLevel::City => self.locality = id,
        }
    }

    /// Every legacy id from the country down to `level`, or `None` as soon
    /// as one of them is missing.
    pub fn chain_to(&self, level: AdminLevel) -> Option<Vec<(AdminLevel, LegacyId)>> {
        level
            .ancestors()
            .chain(std::iter::once(level))
            .map(|l| self.get(l).map(|id| (l, id)))
            .collect()
    }

    /// Replace `from` with `to` at `level`. Returns whether anything changed.
    pub fn repoint(&mut self, level: AdminLevel, from: LegacyId, to: LegacyId) -> bool {
        if self.get(level) == Some(from) {
            self.set(level, Some(to));
            true
        } else {
            false
        }
    }
}

/// A persisted node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicNode {
    pub id: NodeId,
    pub name: NodeName,
    pub short_name: ShortName,
    pub google_name: Option<String>,
    pub google_place_id: Option<String>,
    #[serde(flatten)]
    pub coordinates: Option<Coordinates>,
    pub country_code: Option<CountryCode>,
    pub admin_level: AdminLevel,
    pub parent_id: Option<NodeId>,
    pub root_id: Option<NodeId>,
    #[serde(flatten)]
    pub legacy: LegacyLinkage,
    pub created_at: DateTime<Utc>,
}

impl GeographicNode {
    pub fn is_root(&self) -> bool {
        self.admin_level == AdminLevel::Country
    }

    /// Check that `parent` may be this node's parent: it must sit exactly one
    /// level higher. Only strictly-higher parents are allowed, so cycles are
    /// impossible by construction.
    pub fn check_parent(&self, parent: &GeographicNode) -> Result<(), DomainError> {
        check_parent_level(self.admin_level, parent)
    }
}

pub(crate) fn check_parent_level(
    level: AdminLevel,
    parent: &GeographicNode,
) -> Result<(), DomainError> {
    match level.parent() {
        None => Err(DomainError::constraint(format!(
            "A {} node cannot have a parent",
            level
        ))),
        Some(expected) if expected != parent.admin_level => {
            Err(DomainError::constraint(format!(
                "A {} node needs a {} parent, node {} is a {}",
                level, expected, parent.id, parent.admin_level
            )))
        }
        Some(_) => Ok(()),
    }
}

/// Fields for inserting a node. The store assigns `id`, `root_id` (for
/// parentless countries and for children of rooted parents) and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGeographicNode {
    pub name: NodeName,
    pub short_name: ShortName,
    pub admin_level: AdminLevel,
    pub parent_id: Option<NodeId>,
    pub google_name: Option<String>,
    pub google_place_id: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub country_code: Option<CountryCode>,
    pub legacy: LegacyLinkage,
}

impl NewGeographicNode {
    /// A country.
    pub fn root(name: NodeName, short_name: ShortName) -> Self {
        Self::unlinked(name, short_name, AdminLevel::Country)
    }

    /// A node directly under `parent`; the level follows from the parent's.
    pub fn child_of(
        parent: &GeographicNode,
        name: NodeName,
        short_name: ShortName,
    ) -> Result<Self, DomainError> {
        let level = parent.admin_level.child().ok_or_else(|| {
            DomainError::constraint(format!(
                "Node {} is a {} and cannot have children",
                parent.id, parent.admin_level
            ))
        })?;
        let mut node = Self::unlinked(name, short_name, level);
        node.parent_id = Some(parent.id);
        node.country_code = parent.country_code.clone();
        Ok(node)
    }

    /// A node whose parent is assigned later (migration batches).
    pub fn unlinked(name: NodeName, short_name: ShortName, admin_level: AdminLevel) -> Self {
        Self {
            name,
            short_name,
            admin_level,
            parent_id: None,
            google_name: None,
            google_place_id: None,
            coordinates: None,
            country_code: None,
            legacy: LegacyLinkage::default(),
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_google_place(mut self, name: impl Into<String>, place_id: impl Into<String>) -> Self {
        self.google_name = Some(name.into());
        self.google_place_id = Some(place_id.into());
        self
    }

    pub fn with_country_code(mut self, code: CountryCode) -> Self {
        self.country_code = Some(code);
        self
    }

    pub fn with_legacy(mut self, legacy: LegacyLinkage) -> Self {
        self.legacy = legacy;
        self
    }

    /// Structural checks that need no store access.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.admin_level == AdminLevel::Country && self.parent_id.is_some() {
            return Err(DomainError::constraint("A country cannot have a parent"));
        }
        Ok(())
    }

    /// Check a prospective parent the same way `GeographicNode::check_parent` does.
    pub fn check_parent(&self, parent: &GeographicNode) -> Result<(), DomainError> {
        check_parent_level(self.admin_level, parent)
    }

    /// Materialize as a node with the given identity (used by dry runs).
    pub fn into_node(self, id: NodeId, created_at: DateTime<Utc>) -> GeographicNode {
        let root_id = (self.admin_level == AdminLevel::Country && self.parent_id.is_none())
            .then_some(id);
        GeographicNode {
            id,
            name: self.name,
            short_name: self.short_name,
            google_name: self.google_name,
            google_place_id: self.google_place_id,
            coordinates: self.coordinates,
            country_code: self.country_code,
            admin_level: self.admin_level,
            parent_id: self.parent_id,
            root_id,
            legacy: self.legacy,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn node(id: i64, level: AdminLevel, short: &str) -> GeographicNode {
        NewGeographicNode::unlinked(
            NodeName::new(short).unwrap(),
            ShortName::new(short).unwrap(),
            level,
        )
        .into_node(NodeId::new(id), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn root_materializes_with_own_root_id() {
        let us = node(1, AdminLevel::Country, "us");
        assert!(us.is_root());
        assert_eq!(us.root_id, Some(NodeId::new(1)));
        assert_eq!(us.parent_id, None);
    }

    #[test]
    fn parent_must_be_exactly_one_level_up() {
        let us = node(1, AdminLevel::Country, "us");
        let ca = node(2, AdminLevel::State, "ca");
        let la = node(3, AdminLevel::County, "la");

        assert!(ca.check_parent(&us).is_ok());
        assert!(la.check_parent(&ca).is_ok());
        assert!(la.check_parent(&us).is_err());
        assert!(us.check_parent(&ca).is_err());
        assert!(ca.check_parent(&la).is_err());
    }

    #[test]
    fn child_of_city_is_rejected() {
        let city = node(4, AdminLevel::City, "santa-monica");
        let result = NewGeographicNode::child_of(
            &city,
            NodeName::new("Pier").unwrap(),
            ShortName::new("pier").unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn child_of_inherits_country_code() {
        let mut us = node(1, AdminLevel::Country, "us");
        us.country_code = Some(CountryCode::new("US").unwrap());
        let ca = NewGeographicNode::child_of(
            &us,
            NodeName::new("California").unwrap(),
            ShortName::new("ca").unwrap(),
        )
        .unwrap();
        assert_eq!(ca.admin_level, AdminLevel::State);
        assert_eq!(ca.parent_id, Some(NodeId::new(1)));
        assert_eq!(ca.country_code.unwrap().as_str(), "US");
    }

    #[test]
    fn legacy_chain_requires_every_level() {
        let mut linkage = LegacyLinkage {
            country: Some(LegacyId::new(1)),
            area_one: Some(LegacyId::new(7)),
            ..Default::default()
        };
        assert_eq!(linkage.chain_to(AdminLevel::State).unwrap().len(), 2);
        assert!(linkage.chain_to(AdminLevel::County).is_none());

        linkage.country = None;
        assert!(linkage.chain_to(AdminLevel::State).is_none());
    }

    #[test]
    fn repoint_only_touches_matching_level() {
        let mut linkage = LegacyLinkage {
            country: Some(LegacyId::new(1)),
            area_one: Some(LegacyId::new(5)),
            ..Default::default()
        };
        assert!(linkage.repoint(AdminLevel::State, LegacyId::new(5), LegacyId::new(3)));
        assert!(!linkage.repoint(AdminLevel::Country, LegacyId::new(5), LegacyId::new(3)));
        assert_eq!(linkage.area_one, Some(LegacyId::new(3)));
        assert_eq!(linkage.country, Some(LegacyId::new(1)));
    }
}
