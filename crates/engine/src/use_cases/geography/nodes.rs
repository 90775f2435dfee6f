//! On-demand node management (geocoded places created outside a migration).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use divemap_domain::{
    Coordinates, CountryCode, GeoPath, GeographicNode, NewGeographicNode, NodeId, NodeName,
    ShortName,
};

use super::{GeographyError, LegacyUrl, ResolvePath};
use crate::infrastructure::ports::NodeRepo;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateNodeInput {
    pub name: String,
    /// Derived from `name` when omitted.
    pub short_name: Option<String>,
    /// Omitted for a country.
    pub parent_id: Option<NodeId>,
    pub google_name: Option<String>,
    pub google_place_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country_code: Option<String>,
}

/// Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNodeInput {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub google_name: Option<String>,
    pub google_place_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country_code: Option<String>,
}

impl UpdateNodeInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.short_name.is_none()
            && self.google_name.is_none()
            && self.google_place_id.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.country_code.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDetails {
    #[serde(flatten)]
    pub node: GeographicNode,
    pub path: Option<GeoPath>,
    pub url: Option<String>,
    pub legacy_url: Option<String>,
}

pub struct NodeOps {
    nodes: Arc<dyn NodeRepo>,
    resolve: Arc<ResolvePath>,
    legacy_url: Arc<LegacyUrl>,
}

impl NodeOps {
    pub fn new(
        nodes: Arc<dyn NodeRepo>,
        resolve: Arc<ResolvePath>,
        legacy_url: Arc<LegacyUrl>,
    ) -> Self {
        Self {
            nodes,
            resolve,
            legacy_url,
        }
    }

    pub async fn create(&self, input: CreateNodeInput) -> Result<GeographicNode, GeographyError> {
        let name = NodeName::new(input.name)?;
        let short_name = match input.short_name {
            Some(short) => ShortName::new(short)?,
            None => ShortName::slugify(name.as_str())?,
        };

        let mut node = match input.parent_id {
            Some(parent_id) => {
                let parent = self.nodes.get(parent_id).await?.ok_or_else(|| {
                    GeographyError::NotFound(format!("Parent node {} not found", parent_id))
                })?;
                NewGeographicNode::child_of(&parent, name, short_name)?
            }
            None => NewGeographicNode::root(name, short_name),
        };

        node.coordinates = coordinates(input.latitude, input.longitude)?;
        node.google_name = input.google_name;
        node.google_place_id = input.google_place_id;
        if let Some(code) = input.country_code {
            node.country_code = Some(CountryCode::new(code)?);
        }

        let created = self.nodes.insert(&node).await?;
        tracing::info!(
            node_id = %created.id,
            short_name = %created.short_name,
            admin_level = %created.admin_level,
            "Created geographic node"
        );
        Ok(created)
    }

    pub async fn get(&self, id: NodeId) -> Result<NodeDetails, GeographyError> {
        let node = self
            .nodes
            .get(id)
            .await?
            .ok_or_else(|| GeographyError::NotFound(format!("Node {} not found", id)))?;
        let path = self.resolve.path_of(id).await?;
        let legacy_url = self.legacy_url.execute(&node).await?;
        Ok(NodeDetails {
            url: path.as_ref().map(GeoPath::to_url),
            path,
            legacy_url,
            node,
        })
    }

    pub async fn update(
        &self,
        id: NodeId,
        input: UpdateNodeInput,
    ) -> Result<GeographicNode, GeographyError> {
        if input.is_empty() {
            return Err(GeographyError::InvalidInput(
                "Update must set at least one field".to_string(),
            ));
        }
        let mut node = self
            .nodes
            .get(id)
            .await?
            .ok_or_else(|| GeographyError::NotFound(format!("Node {} not found", id)))?;

        if let Some(name) = input.name {
            node.name = NodeName::new(name)?;
        }
        if let Some(short) = input.short_name {
            node.short_name = ShortName::new(short)?;
        }
        if input.google_name.is_some() {
            node.google_name = input.google_name;
        }
        if input.google_place_id.is_some() {
            node.google_place_id = input.google_place_id;
        }
        if input.latitude.is_some() || input.longitude.is_some() {
            node.coordinates = coordinates(input.latitude, input.longitude)?;
        }
        if let Some(code) = input.country_code {
            node.country_code = Some(CountryCode::new(code)?);
        }

        self.nodes.update(&node).await?;
        tracing::info!(node_id = %node.id, "Updated geographic node");
        Ok(node)
    }
}

fn coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinates>, GeographyError> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Ok(Some(Coordinates::new(lat, lng)?)),
        (None, None) => Ok(None),
        _ => Err(GeographyError::InvalidInput(
            "latitude and longitude must be given together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockLegacyRepo, MockNodeRepo, RepoError};
    use crate::use_cases::geography::test_support::stored;
    use chrono::{TimeZone, Utc};
    use divemap_domain::AdminLevel;
    use mockall::predicate::*;

    fn ops(nodes: MockNodeRepo) -> NodeOps {
        let nodes: Arc<dyn NodeRepo> = Arc::new(nodes);
        NodeOps::new(
            nodes.clone(),
            Arc::new(ResolvePath::new(nodes)),
            Arc::new(LegacyUrl::new(Arc::new(MockLegacyRepo::new()))),
        )
    }

    #[tokio::test]
    async fn create_slugifies_and_links_to_parent() {
        let mut nodes = MockNodeRepo::new();
        nodes
            .expect_get()
            .with(eq(NodeId::new(3)))
            .returning(|_| Ok(Some(stored(3, AdminLevel::County, "la", Some(2), 1))));
        nodes
            .expect_insert()
            .withf(|node| {
                node.short_name.as_str() == "santa-monica"
                    && node.admin_level == AdminLevel::City
                    && node.parent_id == Some(NodeId::new(3))
                    && node.coordinates.is_some()
            })
            .returning(|node| {
                Ok(node.clone().into_node(
                    NodeId::new(4),
                    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
                ))
            });

        let created = ops(nodes)
            .create(CreateNodeInput {
                name: "Santa Monica".into(),
                parent_id: Some(NodeId::new(3)),
                latitude: Some(34.0195),
                longitude: Some(-118.4912),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, NodeId::new(4));
    }

    #[tokio::test]
    async fn create_under_missing_parent_is_not_found() {
        let mut nodes = MockNodeRepo::new();
        nodes.expect_get().returning(|_| Ok(None));

        let err = ops(nodes)
            .create(CreateNodeInput {
                name: "Nowhere".into(),
                parent_id: Some(NodeId::new(99)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_sibling_is_a_conflict() {
        let mut nodes = MockNodeRepo::new();
        nodes
            .expect_insert()
            .returning(|node| Err(RepoError::duplicate_segment(None, &node.short_name)));

        let err = ops(nodes)
            .create(CreateNodeInput {
                name: "United States".into(),
                short_name: Some("us".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::Conflict(_)));
    }

    #[tokio::test]
    async fn half_a_coordinate_pair_is_rejected() {
        let err = ops(MockNodeRepo::new())
            .create(CreateNodeInput {
                name: "Mexico".into(),
                latitude: Some(23.6),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn get_includes_path_and_url() {
        let mut nodes = MockNodeRepo::new();
        nodes
            .expect_get()
            .returning(|_| Ok(Some(stored(2, AdminLevel::State, "ca", Some(1), 1))));
        nodes.expect_ancestors().returning(|_| {
            Ok(vec![
                stored(1, AdminLevel::Country, "us", None, 1),
                stored(2, AdminLevel::State, "ca", Some(1), 1),
            ])
        });

        let details = ops(nodes).get(NodeId::new(2)).await.unwrap();
        assert_eq!(details.url.as_deref(), Some("/loc/us/ca"));
        assert_eq!(details.legacy_url, None);
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let err = ops(MockNodeRepo::new())
            .update(NodeId::new(1), UpdateNodeInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeographyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn update_writes_changed_fields() {
        let mut nodes = MockNodeRepo::new();
        nodes
            .expect_get()
            .returning(|_| Ok(Some(stored(2, AdminLevel::State, "ca", Some(1), 1))));
        nodes
            .expect_update()
            .withf(|node| node.name.as_str() == "California" && node.short_name.as_str() == "ca")
            .times(1)
            .returning(|_| Ok(()));

        let node = ops(nodes)
            .update(
                NodeId::new(2),
                UpdateNodeInput {
                    name: Some("California".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(node.name.as_str(), "California");
    }
}
