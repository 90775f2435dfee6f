//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Database access (node store, legacy tables, places)
//! - Clock (for testing)

mod error;
mod repos;
mod testing;
mod types;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{BatchResult, LegacyRepo, NodeRepo, PlaceRepo};

pub use types::{BranchCount, CollapseOutcome, DependentCounts, LegacyMergeOutcome};

// =============================================================================
// Test-Only Mock Repositories (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{MockLegacyRepo, MockNodeRepo, MockPlaceRepo};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::RepoError;
