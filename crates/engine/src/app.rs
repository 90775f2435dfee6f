//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::{
    config::EngineConfig,
    ports::{ClockPort, LegacyRepo, NodeRepo, PlaceRepo},
    sqlite::SqliteRepositories,
};
use crate::use_cases::{GeographyUseCases, HierarchyMigrator};

/// Main application state.
///
/// Holds the repositories and use cases. Passed to HTTP handlers via Axum
/// state.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
    pub config: EngineConfig,
}

/// Container for the store ports.
pub struct Repositories {
    pub node: Arc<dyn NodeRepo>,
    pub legacy: Arc<dyn LegacyRepo>,
    pub place: Arc<dyn PlaceRepo>,
}

/// Container for all use cases.
pub struct UseCases {
    pub geography: GeographyUseCases,
    pub migration: Arc<HierarchyMigrator>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(repos: SqliteRepositories, config: EngineConfig, clock: Arc<dyn ClockPort>) -> Self {
        let repositories = Repositories {
            node: repos.node.clone(),
            legacy: repos.legacy.clone(),
            place: repos.place.clone(),
        };
        Self::from_ports(repositories, config, clock)
    }

    /// Wire use cases over arbitrary port implementations.
    pub fn from_ports(
        repositories: Repositories,
        config: EngineConfig,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        let geography = GeographyUseCases::new(
            repositories.node.clone(),
            repositories.legacy.clone(),
            repositories.place.clone(),
            config.page_limits,
        );
        let migration = Arc::new(HierarchyMigrator::new(
            repositories.node.clone(),
            repositories.legacy.clone(),
            clock,
        ));

        Self {
            repositories,
            use_cases: UseCases {
                geography,
                migration,
            },
            config,
        }
    }
}
