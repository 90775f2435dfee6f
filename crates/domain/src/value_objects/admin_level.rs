//! Rank of a node in the hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Administrative level, 0 = country through 3 = city.
///
/// Each level also names one of the legacy flat tables (`country`,
/// `area_one`, `area_two`, `locality`), which map onto the tree one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AdminLevel {
    Country,
    State,
    County,
    City,
}

impl AdminLevel {
    /// All levels, top of the tree first.
    pub const ALL: [AdminLevel; 4] = [
        AdminLevel::Country,
        AdminLevel::State,
        AdminLevel::County,
        AdminLevel::City,
    ];

    pub const fn depth(self) -> u8 {
        match self {
            AdminLevel::Country => 0,
            AdminLevel::State => 1,
            AdminLevel::County => 2,
            AdminLevel::City => 3,
        }
    }

    pub fn from_depth(depth: i64) -> Result<Self, DomainError> {
        match depth {
            0 => Ok(AdminLevel::Country),
            1 => Ok(AdminLevel::State),
            2 => Ok(AdminLevel::County),
            3 => Ok(AdminLevel::City),
            other => Err(DomainError::validation(format!(
                "admin_level must be between 0 and 3, got {}",
                other
            ))),
        }
    }

    /// The level one rung up, `None` for countries.
    pub fn parent(self) -> Option<Self> {
        match self {
            AdminLevel::Country => None,
            AdminLevel::State => Some(AdminLevel::Country),
            AdminLevel::County => Some(AdminLevel::State),
            AdminLevel::City => Some(AdminLevel::County),
        }
    }

    /// The level one rung down, `None` for cities.
    pub fn child(self) -> Option<Self> {
        match self {
            AdminLevel::Country => Some(AdminLevel::State),
            AdminLevel::State => Some(AdminLevel::County),
            AdminLevel::County => Some(AdminLevel::City),
            AdminLevel::City => None,
        }
    }

    /// Levels strictly above this one, top first.
    pub fn ancestors(self) -> impl Iterator<Item = AdminLevel> {
        Self::ALL.into_iter().take(self.depth() as usize)
    }

    /// Levels strictly below this one.
    pub fn descendants(self) -> impl Iterator<Item = AdminLevel> {
        Self::ALL.into_iter().skip(self.depth() as usize + 1)
    }

    /// Name of the matching legacy flat table as used in legacy URLs.
    pub const fn legacy_name(self) -> &'static str {
        match self {
            AdminLevel::Country => "country",
            AdminLevel::State => "area_one",
            AdminLevel::County => "area_two",
            AdminLevel::City => "locality",
        }
    }

    pub fn from_legacy_name(name: &str) -> Result<Self, DomainError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "country" => Ok(AdminLevel::Country),
            "area_one" => Ok(AdminLevel::State),
            "area_two" => Ok(AdminLevel::County),
            "locality" => Ok(AdminLevel::City),
            other => Err(DomainError::parse(format!("Unknown legacy level: {}", other))),
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminLevel::Country => write!(f, "country"),
            AdminLevel::State => write!(f, "state"),
            AdminLevel::County => write!(f, "county"),
            AdminLevel::City => write!(f, "city"),
        }
    }
}

impl FromStr for AdminLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" | "0" => Ok(AdminLevel::Country),
            "state" | "province" | "1" => Ok(AdminLevel::State),
            "county" | "2" => Ok(AdminLevel::County),
            "city" | "3" => Ok(AdminLevel::City),
            other => Err(DomainError::parse(format!("Unknown admin level: {}", other))),
        }
    }
}

impl TryFrom<u8> for AdminLevel {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_depth(i64::from(value))
    }
}

impl From<AdminLevel> for u8 {
    fn from(level: AdminLevel) -> u8 {
        level.depth()
    }
}
