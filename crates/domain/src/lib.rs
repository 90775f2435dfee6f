//! Divemap domain layer.
//!
//! Pure types and rules for the geographic hierarchy: node identity,
//! validated value objects, the legacy flat-table rows being migrated, and
//! the planning functions the migrator and tree verifier are built on.
//! Nothing in this crate performs I/O.

pub mod entities;
pub mod error;
pub mod ids;
pub mod migration;
pub mod tree;
pub mod value_objects;

pub use entities::{
    GeographicNode, LegacyLinkage, LegacyRow, LegacyRowPatch, NewGeographicNode, NewLegacyRow,
    NewPlace, Page, Place, PlaceKind, PlaceSort, PlaceTypeFilter, SpotNameId,
};
pub use error::DomainError;
pub use ids::{LegacyId, MigrationRunId, NodeId, PlaceId};
pub use migration::{
    DuplicateGroup, FailureReason, LegacyRef, MigrationCounts, MigrationFailure, MigrationMode,
    MigrationPhase, MigrationReport,
};
pub use tree::{verify_forest, ChainBreak, NodeIndex, TreeViolation};
pub use value_objects::{
    AdminLevel, Coordinates, CountryCode, GeoPath, NodeName, ShortName, STATS_SEGMENT,
};
