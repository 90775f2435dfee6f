use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surrogate keys handed out by the relational store.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

// Unified tree
define_id!(NodeId);

// Spots and dive shops share one id space per table
define_id!(PlaceId);

// Rows of the four legacy flat tables (the table is carried separately)
define_id!(LegacyId);

/// Identifies one migrator invocation in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationRunId(Uuid);

impl MigrationRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MigrationRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MigrationRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&NodeId::new(42)).unwrap();
        assert_eq!(json, "42");

        let back: NodeId = serde_json::from_str("42").unwrap();
        assert_eq!(back, NodeId::new(42));
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(MigrationRunId::new(), MigrationRunId::new());
    }
}
