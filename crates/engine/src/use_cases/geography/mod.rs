//! Geography use cases: path resolution, descendant sets, scoped listings,
//! stats, on-demand node management and the legacy URL adapter.

use std::sync::Arc;

use divemap_domain::DomainError;

use crate::infrastructure::config::PageLimits;
use crate::infrastructure::ports::{LegacyRepo, NodeRepo, PlaceRepo, RepoError};

mod descendants;
mod legacy;
mod listing;
mod nodes;
mod resolve;
mod stats;

pub use descendants::CollectDescendants;
pub use legacy::{LegacyUrl, PatchLegacyRow};
pub use listing::{ListPlaces, ListingQuery, LocLookup, PlaceListing, PlacePage, SpotLookup};
pub use nodes::{CreateNodeInput, NodeDetails, NodeOps, UpdateNodeInput};
pub use resolve::ResolvePath;
pub use stats::{BranchStats, GeographyStats, NodeStats};

/// Shared error type for geography use cases.
#[derive(Debug, thiserror::Error)]
pub enum GeographyError {
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Repository error: {0}")]
    Repo(RepoError),
}

impl From<RepoError> for GeographyError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { .. } => Self::NotFound(err.to_string()),
            RepoError::DuplicatePathSegment { .. } | RepoError::DependentRowsRemain { .. } => {
                Self::Conflict(err.to_string())
            }
            RepoError::ConstraintViolation(message) => Self::InvalidInput(message),
            other => Self::Repo(other),
        }
    }
}

impl From<DomainError> for GeographyError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } => Self::NotFound(err.to_string()),
            DomainError::Validation(message)
            | DomainError::Constraint(message)
            | DomainError::Parse(message) => Self::InvalidInput(message),
        }
    }
}

/// Container for geography use cases.
pub struct GeographyUseCases {
    pub resolve: Arc<ResolvePath>,
    pub descendants: Arc<CollectDescendants>,
    pub listing: ListPlaces,
    pub stats: GeographyStats,
    pub nodes: NodeOps,
    pub legacy_url: Arc<LegacyUrl>,
    pub patch_legacy: PatchLegacyRow,
}

impl GeographyUseCases {
    pub fn new(
        node_repo: Arc<dyn NodeRepo>,
        legacy_repo: Arc<dyn LegacyRepo>,
        place_repo: Arc<dyn PlaceRepo>,
        page_limits: PageLimits,
    ) -> Self {
        let resolve = Arc::new(ResolvePath::new(node_repo.clone()));
        let descendants = Arc::new(CollectDescendants::new(node_repo.clone()));
        let legacy_url = Arc::new(LegacyUrl::new(legacy_repo.clone()));

        Self {
            listing: ListPlaces::new(
                resolve.clone(),
                descendants.clone(),
                place_repo.clone(),
                page_limits,
            ),
            stats: GeographyStats::new(
                resolve.clone(),
                descendants.clone(),
                node_repo.clone(),
                place_repo,
            ),
            nodes: NodeOps::new(node_repo, resolve.clone(), legacy_url.clone()),
            patch_legacy: PatchLegacyRow::new(legacy_repo),
            resolve,
            descendants,
            legacy_url,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use divemap_domain::NodeId;

    #[test]
    fn repo_errors_map_to_use_case_kinds() {
        let err: GeographyError = RepoError::not_found("GeographicNode", 4).into();
        assert!(matches!(err, GeographyError::NotFound(_)));

        let err: GeographyError = RepoError::duplicate_segment(Some(NodeId::new(1)), "ca").into();
        assert!(matches!(err, GeographyError::Conflict(_)));

        let err: GeographyError = RepoError::constraint("bad parent").into();
        assert!(matches!(err, GeographyError::InvalidInput(m) if m == "bad parent"));

        let err: GeographyError = RepoError::database("get_node", "disk I/O").into();
        assert!(matches!(err, GeographyError::Repo(_)));
    }
}
