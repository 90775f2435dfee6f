//! Rows of the pre-migration flat tables (`country`, `area_one`, `area_two`,
//! `locality`).
//!
//! Legacy data was never validated beyond a per-table unique short name, so
//! names and short names are kept as raw strings here; validation happens
//! when a row is turned into a node.

use serde::{Deserialize, Serialize};

use crate::entities::LegacyLinkage;
use crate::error::DomainError;
use crate::ids::LegacyId;
use crate::value_objects::{AdminLevel, ShortName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRow {
    pub level: AdminLevel,
    pub id: LegacyId,
    pub name: String,
    pub short_name: String,
    pub country_id: Option<LegacyId>,
    pub area_one_id: Option<LegacyId>,
    pub area_two_id: Option<LegacyId>,
}

impl LegacyRow {
    /// Foreign key to the table at `level`. For the row's own level this is
    /// the row id; for levels at or below it there is nothing to point at.
    pub fn key_at(&self, level: AdminLevel) -> Option<LegacyId> {
        if level == self.level {
            return Some(self.id);
        }
        if level > self.level {
            return None;
        }
        match level {
            AdminLevel::Country => self.country_id,
            AdminLevel::State => self.area_one_id,
            AdminLevel::County => self.area_two_id,
            AdminLevel::City => None,
        }
    }

    /// The row one rung up this row hangs off, if any.
    pub fn parent_legacy_id(&self) -> Option<LegacyId> {
        self.level.parent().and_then(|p| self.key_at(p))
    }

    /// Slug the row's node gets: the short name as-is when it is already
    /// slug-shaped, otherwise slugified ("United States" -> "united-states").
    pub fn node_short_name(&self) -> Result<ShortName, DomainError> {
        ShortName::new(ShortName::normalize(&self.short_name))
            .or_else(|_| ShortName::slugify(&self.short_name))
    }

    /// Duplicate-detection key: node slug plus immediate parent. Compares
    /// equal to the key of an existing node carrying the same slug.
    pub fn dedup_key(&self) -> (AdminLevel, String, Option<LegacyId>) {
        let short_name = self
            .node_short_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| ShortName::normalize(&self.short_name));
        (self.level, short_name, self.parent_legacy_id())
    }

    /// Node linkage a node created from this row carries.
    pub fn linkage(&self) -> LegacyLinkage {
        let mut linkage = LegacyLinkage::default();
        for level in self.level.ancestors().chain(std::iter::once(self.level)) {
            linkage.set(level, self.key_at(level));
        }
        linkage
    }

    /// Repoint a foreign key at `level` from `from` to `to`.
    pub fn repoint(&mut self, level: AdminLevel, from: LegacyId, to: LegacyId) -> bool {
        if level >= self.level {
            return false;
        }
        let slot = match level {
            AdminLevel::Country => &mut self.country_id,
            AdminLevel::State => &mut self.area_one_id,
            AdminLevel::County => &mut self.area_two_id,
            AdminLevel::City => return false,
        };
        if *slot == Some(from) {
            *slot = Some(to);
            true
        } else {
            false
        }
    }
}

/// Insert payload. `id` is honoured when given so imports keep their keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLegacyRow {
    pub level: AdminLevel,
    pub id: Option<LegacyId>,
    pub name: String,
    pub short_name: String,
    pub country_id: Option<LegacyId>,
    pub area_one_id: Option<LegacyId>,
    pub area_two_id: Option<LegacyId>,
}

impl NewLegacyRow {
    pub fn new(level: AdminLevel, name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            level,
            id: None,
            name: name.into(),
            short_name: short_name.into(),
            country_id: None,
            area_one_id: None,
            area_two_id: None,
        }
    }

    pub fn with_id(mut self, id: LegacyId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_country(mut self, id: LegacyId) -> Self {
        self.country_id = Some(id);
        self
    }

    pub fn with_area_one(mut self, id: LegacyId) -> Self {
        self.area_one_id = Some(id);
        self
    }

    pub fn with_area_two(mut self, id: LegacyId) -> Self {
        self.area_two_id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        check_foreign_keys(
            self.level,
            self.country_id,
            self.area_one_id,
            self.area_two_id,
        )
    }
}

/// Arbitrary field update on a legacy row, as accepted by the legacy patch
/// endpoints. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRowPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub country_id: Option<LegacyId>,
    #[serde(default)]
    pub area_one_id: Option<LegacyId>,
    #[serde(default)]
    pub area_two_id: Option<LegacyId>,
}

impl LegacyRowPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to `row`, rejecting foreign keys the row's table does not have.
    pub fn apply(&self, row: &mut LegacyRow) -> Result<(), DomainError> {
        let mut updated = row.clone();
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("Legacy name cannot be empty"));
            }
            updated.name = name.trim().to_string();
        }
        if let Some(short_name) = &self.short_name {
            if short_name.trim().is_empty() {
                return Err(DomainError::validation("Legacy short name cannot be empty"));
            }
            updated.short_name = short_name.trim().to_string();
        }
        if self.country_id.is_some() {
            updated.country_id = self.country_id;
        }
        if self.area_one_id.is_some() {
            updated.area_one_id = self.area_one_id;
        }
        if self.area_two_id.is_some() {
            updated.area_two_id = self.area_two_id;
        }
        check_foreign_keys(
            updated.level,
            updated.country_id,
            updated.area_one_id,
            updated.area_two_id,
        )?;
        *row = updated;
        Ok(())
    }
}

fn check_foreign_keys(
    level: AdminLevel,
    country_id: Option<LegacyId>,
    area_one_id: Option<LegacyId>,
    area_two_id: Option<LegacyId>,
) -> Result<(), DomainError> {
    let offending = [
        (AdminLevel::Country, country_id, "country_id"),
        (AdminLevel::State, area_one_id, "area_one_id"),
        (AdminLevel::County, area_two_id, "area_two_id"),
    ]
    .into_iter()
    .find(|(fk_level, value, _)| value.is_some() && *fk_level >= level);

    match offending {
        Some((_, _, column)) => Err(DomainError::validation(format!(
            "{} rows have no {} column",
            level.legacy_name(),
            column
        ))),
        None => Ok(()),
    }
}
