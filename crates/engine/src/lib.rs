//! Divemap Engine library.
//!
//! Server-side code for the dive-site geography service.
//!
//! ## Structure
//!
//! - `use_cases/` - Path resolution, listings, stats, node management and the hierarchy migrator
//! - `infrastructure/` - Ports, SQLite adapters, clock and configuration
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Test fixtures module for integration testing.
#[cfg(test)]
pub mod test_fixtures;

/// E2E tests through the HTTP router over a temporary SQLite store.
#[cfg(test)]
mod e2e_tests;

pub use app::App;
