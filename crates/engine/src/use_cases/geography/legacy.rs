//! Backward-compatible URLs and edits for the legacy flat tables.

use std::sync::Arc;

use divemap_domain::{AdminLevel, GeographicNode, LegacyId, LegacyRow, LegacyRowPatch, ShortName};

use super::GeographyError;
use crate::infrastructure::ports::LegacyRepo;

/// Rebuilds `/country/area_one/area_two/locality` from a node's legacy
/// linkage.
pub struct LegacyUrl {
    legacy: Arc<dyn LegacyRepo>,
}

impl LegacyUrl {
    pub fn new(legacy: Arc<dyn LegacyRepo>) -> Self {
        Self { legacy }
    }

    /// `None` unless every level down to the node's own is linked, each row
    /// exists, and each row's parent key names the row above it. Partial
    /// URLs are never produced.
    pub async fn execute(&self, node: &GeographicNode) -> Result<Option<String>, GeographyError> {
        let Some(chain) = node.legacy.chain_to(node.admin_level) else {
            return Ok(None);
        };

        let mut segments = Vec::with_capacity(chain.len());
        let mut above: Option<LegacyRow> = None;
        for (level, id) in chain {
            let Some(row) = self.legacy.get(level, id).await? else {
                tracing::debug!(
                    node_id = %node.id,
                    table = level.legacy_name(),
                    legacy_id = %id,
                    "Legacy row missing"
                );
                return Ok(None);
            };
            if let Some(parent) = &above {
                if row.parent_legacy_id() != Some(parent.id) {
                    return Ok(None);
                }
            }
            segments.push(ShortName::normalize(&row.short_name));
            above = Some(row);
        }

        Ok(Some(format!("/{}", segments.join("/"))))
    }
}

/// Field updates on a legacy row, addressed by table name.
pub struct PatchLegacyRow {
    legacy: Arc<dyn LegacyRepo>,
}

impl PatchLegacyRow {
    pub fn new(legacy: Arc<dyn LegacyRepo>) -> Self {
        Self { legacy }
    }

    pub async fn execute(
        &self,
        table: &str,
        id: LegacyId,
        patch: LegacyRowPatch,
    ) -> Result<LegacyRow, GeographyError> {
        let level = AdminLevel::from_legacy_name(table)
            .map_err(|_| GeographyError::NotFound(format!("No legacy table named '{}'", table)))?;
        if patch.is_empty() {
            return Err(GeographyError::InvalidInput(
                "Patch must set at least one field".to_string(),
            ));
        }
        Ok(self.legacy.patch(level, id, &patch).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockLegacyRepo, RepoError};
    use crate::use_cases::geography::test_support::stored;
    use divemap_domain::LegacyLinkage;
    use mockall::predicate::*;

    fn row(level: AdminLevel, id: i64, short: &str, parent: Option<i64>) -> LegacyRow {
        let parent = parent.map(LegacyId::new);
        LegacyRow {
            level,
            id: LegacyId::new(id),
            name: short.to_uppercase(),
            short_name: short.to_string(),
            country_id: if level == AdminLevel::State { parent } else { None },
            area_one_id: if level == AdminLevel::County { parent } else { None },
            area_two_id: None,
        }
    }

    fn county_node(area_one: i64) -> GeographicNode {
        let mut node = stored(3, AdminLevel::County, "la", Some(2), 1);
        node.legacy = LegacyLinkage {
            country: Some(LegacyId::new(1)),
            area_one: Some(LegacyId::new(area_one)),
            area_two: Some(LegacyId::new(30)),
            locality: None,
        };
        node
    }

    fn legacy_tables() -> MockLegacyRepo {
        let mut repo = MockLegacyRepo::new();
        repo.expect_get().returning(|level, id| {
            Ok(match (level, id.get()) {
                (AdminLevel::Country, 1) => Some(row(level, 1, "us", None)),
                (AdminLevel::State, 10) => Some(row(level, 10, "CA", Some(1))),
                (AdminLevel::State, 11) => Some(row(level, 11, "ny", Some(1))),
                (AdminLevel::County, 30) => Some(row(level, 30, "la", Some(10))),
                _ => None,
            })
        });
        repo
    }

    #[tokio::test]
    async fn full_chain_builds_the_legacy_url() {
        let url = LegacyUrl::new(Arc::new(legacy_tables()))
            .execute(&county_node(10))
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("/us/ca/la"));
    }

    #[tokio::test]
    async fn inconsistent_chain_yields_none() {
        // la's area_one_id is 10, but the node claims 11
        let url = LegacyUrl::new(Arc::new(legacy_tables()))
            .execute(&county_node(11))
            .await
            .unwrap();
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn missing_link_yields_none_without_lookups() {
        let mut node = county_node(10);
        node.legacy.area_one = None;
        let url = LegacyUrl::new(Arc::new(MockLegacyRepo::new()))
            .execute(&node)
            .await
            .unwrap();
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn patch_rejects_unknown_tables_and_empty_patches() {
        let patcher = PatchLegacyRow::new(Arc::new(MockLegacyRepo::new()));
        let err = patcher
            .execute("continent", LegacyId::new(1), LegacyRowPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::NotFound(_)));

        let err = patcher
            .execute("area_one", LegacyId::new(1), LegacyRowPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn patch_of_missing_row_is_not_found() {
        let mut repo = MockLegacyRepo::new();
        repo.expect_patch()
            .with(eq(AdminLevel::State), eq(LegacyId::new(9)), always())
            .returning(|level, id, _| Err(RepoError::not_found(level.legacy_name(), id)));

        let patch = LegacyRowPatch {
            name: Some("Calif".into()),
            ..Default::default()
        };
        let err = PatchLegacyRow::new(Arc::new(repo))
            .execute("area_one", LegacyId::new(9), patch)
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::NotFound(_)));
    }
}
