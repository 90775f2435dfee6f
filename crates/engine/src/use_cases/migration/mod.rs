//! Legacy-table migration into the node tree.

mod migrator;

pub use migrator::{HierarchyMigrator, MigrationError, MAX_PASSES};
