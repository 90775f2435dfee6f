//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific domain area.

pub mod geography;
pub mod migration;

pub use geography::{GeographyError, GeographyUseCases};
pub use migration::{HierarchyMigrator, MigrationError};
