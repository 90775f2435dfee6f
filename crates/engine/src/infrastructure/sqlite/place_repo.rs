//! SQLite access to spots and dive shops.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

use divemap_domain::{LegacyId, NewPlace, NodeId, Page, Place, PlaceId, PlaceKind, PlaceSort};

use super::{get_col, id_set_json, linkage_cols, node_id_col, place_legacy_column};
use crate::infrastructure::ports::{BranchCount, ClockPort, PlaceRepo, RepoError};

const PLACE_COLUMNS: &str = "id, name, geographic_node_id, country_id, area_one_id, \
    area_two_id, locality_id, avg_rating, num_reviews, created_at";

// Every node below `node_id` tagged with the child of `node_id` it hangs
// off; places are then counted per tag.
const BRANCH_COUNTS_SQL: &str = r#"
    WITH RECURSIVE branch(branch_id, id) AS (
        SELECT id, id FROM geographic_nodes WHERE parent_id = ?1
        UNION
        SELECT b.branch_id, n.id
        FROM geographic_nodes n JOIN branch b ON n.parent_id = b.id
    )
    SELECT b.branch_id AS child_id,
           COUNT(DISTINCT s.id) AS spot_count,
           COUNT(DISTINCT d.id) AS shop_count
    FROM branch b
    LEFT JOIN spots s ON s.geographic_node_id = b.id
    LEFT JOIN dive_shops d ON d.geographic_node_id = b.id
    GROUP BY b.branch_id
    HAVING COUNT(DISTINCT s.id) > 0 OR COUNT(DISTINCT d.id) > 0
    ORDER BY b.branch_id
"#;

/// SQLite implementation of [`PlaceRepo`].
pub struct SqlitePlaceRepo {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqlitePlaceRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self { pool, clock }
    }
}

fn table(kind: PlaceKind) -> &'static str {
    match kind {
        PlaceKind::Spot => "spots",
        PlaceKind::Shop => "dive_shops",
    }
}

fn order_by(sort: PlaceSort) -> &'static str {
    match sort {
        PlaceSort::Top => "avg_rating DESC, num_reviews DESC, id ASC",
        PlaceSort::Latest => "created_at DESC, id DESC",
        PlaceSort::MostReviewed => "num_reviews DESC, avg_rating DESC, id ASC",
    }
}

fn place_from_row(kind: PlaceKind, row: &SqliteRow) -> Result<Place, RepoError> {
    Ok(Place {
        kind,
        id: PlaceId::new(get_col::<i64>(row, "id")?),
        name: get_col(row, "name")?,
        geographic_node_id: node_id_col(row, "geographic_node_id")?,
        legacy: linkage_cols(row, place_legacy_column)?,
        avg_rating: get_col(row, "avg_rating")?,
        num_reviews: get_col(row, "num_reviews")?,
        created_at: get_col(row, "created_at")?,
    })
}

fn node_set(node_ids: &HashSet<NodeId>) -> Result<String, RepoError> {
    id_set_json(node_ids.iter().map(|id| id.get()))
}

#[async_trait]
impl PlaceRepo for SqlitePlaceRepo {
    async fn get(&self, kind: PlaceKind, id: PlaceId) -> Result<Option<Place>, RepoError> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", PLACE_COLUMNS, table(kind));
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_place", e))?;
        row.as_ref().map(|row| place_from_row(kind, row)).transpose()
    }

    async fn insert(&self, place: &NewPlace) -> Result<Place, RepoError> {
        let sql = format!(
            "INSERT INTO {} (name, geographic_node_id, country_id, area_one_id, area_two_id, \
             locality_id, avg_rating, num_reviews, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            table(place.kind)
        );
        let result = sqlx::query(&sql)
            .bind(place.name.as_str())
            .bind(place.geographic_node_id.map(NodeId::get))
            .bind(place.legacy.country.map(LegacyId::get))
            .bind(place.legacy.area_one.map(LegacyId::get))
            .bind(place.legacy.area_two.map(LegacyId::get))
            .bind(place.legacy.locality.map(LegacyId::get))
            .bind(place.avg_rating)
            .bind(place.num_reviews)
            .bind(self.clock.now())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("insert_place", e))?;

        let id = PlaceId::new(result.last_insert_rowid());
        self.get(place.kind, id)
            .await?
            .ok_or_else(|| RepoError::not_found("Place", id))
    }

    async fn list_in_nodes(
        &self,
        kind: PlaceKind,
        node_ids: &HashSet<NodeId>,
        sort: PlaceSort,
        page: Page,
    ) -> Result<Vec<Place>, RepoError> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE geographic_node_id IN (SELECT value FROM json_each(?)) \
             ORDER BY {} LIMIT ? OFFSET ?",
            PLACE_COLUMNS,
            table(kind),
            order_by(sort)
        );
        let rows = sqlx::query(&sql)
            .bind(node_set(node_ids)?)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_places", e))?;
        rows.iter().map(|row| place_from_row(kind, row)).collect()
    }

    async fn count_in_nodes(
        &self,
        kind: PlaceKind,
        node_ids: &HashSet<NodeId>,
    ) -> Result<i64, RepoError> {
        if node_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE geographic_node_id IN (SELECT value FROM json_each(?))",
            table(kind)
        );
        sqlx::query_scalar(&sql)
            .bind(node_set(node_ids)?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("count_places", e))
    }

    async fn count_by_branch(&self, node_id: NodeId) -> Result<Vec<BranchCount>, RepoError> {
        let rows = sqlx::query(BRANCH_COUNTS_SQL)
            .bind(node_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("count_by_branch", e))?;
        rows.iter()
            .map(|row| {
                Ok(BranchCount {
                    child_id: NodeId::new(get_col::<i64>(row, "child_id")?),
                    spot_count: get_col(row, "spot_count")?,
                    shop_count: get_col(row, "shop_count")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::NodeRepo;
    use crate::infrastructure::sqlite::test_support::temp_repositories;
    use divemap_domain::{GeographicNode, NewGeographicNode, NodeName, ShortName};

    async fn insert_node(
        repos: &crate::infrastructure::sqlite::SqliteRepositories,
        parent: Option<&GeographicNode>,
        slug: &str,
    ) -> GeographicNode {
        let name = NodeName::new(slug).unwrap();
        let short = ShortName::new(slug).unwrap();
        let node = match parent {
            Some(parent) => NewGeographicNode::child_of(parent, name, short).unwrap(),
            None => NewGeographicNode::root(name, short),
        };
        repos.node.insert(&node).await.unwrap()
    }

    #[tokio::test]
    async fn listing_is_sorted_and_paged() {
        let (_dir, repos) = temp_repositories().await;
        let us = insert_node(&repos, None, "us").await;
        for (name, rating, reviews) in [("a", 4.0, 10), ("b", 5.0, 1), ("c", 4.0, 30)] {
            repos
                .place
                .insert(
                    &NewPlace::new(PlaceKind::Spot, name)
                        .in_node(us.id)
                        .with_rating(rating, reviews),
                )
                .await
                .unwrap();
        }
        let ids: HashSet<NodeId> = [us.id].into();

        let names = |places: Vec<Place>| places.into_iter().map(|p| p.name).collect::<Vec<_>>();
        let top = repos
            .place
            .list_in_nodes(PlaceKind::Spot, &ids, PlaceSort::Top, Page::new(10, 0))
            .await
            .unwrap();
        assert_eq!(names(top), vec!["b", "c", "a"]);

        let most = repos
            .place
            .list_in_nodes(PlaceKind::Spot, &ids, PlaceSort::MostReviewed, Page::new(2, 1))
            .await
            .unwrap();
        assert_eq!(names(most), vec!["a", "b"]);

        assert_eq!(
            repos.place.count_in_nodes(PlaceKind::Spot, &ids).await.unwrap(),
            3
        );
        assert_eq!(
            repos.place.count_in_nodes(PlaceKind::Shop, &ids).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn empty_node_set_lists_nothing() {
        let (_dir, repos) = temp_repositories().await;
        let none = HashSet::new();
        assert!(repos
            .place
            .list_in_nodes(PlaceKind::Shop, &none, PlaceSort::Latest, Page::new(5, 0))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn branch_counts_cover_whole_subtrees() {
        let (_dir, repos) = temp_repositories().await;
        let us = insert_node(&repos, None, "us").await;
        let ca = insert_node(&repos, Some(&us), "ca").await;
        let la = insert_node(&repos, Some(&ca), "la").await;
        let sm = insert_node(&repos, Some(&la), "santa-monica").await;
        insert_node(&repos, Some(&us), "ny").await;

        for node in [ca.id, sm.id] {
            repos
                .place
                .insert(&NewPlace::new(PlaceKind::Spot, "reef").in_node(node))
                .await
                .unwrap();
        }
        repos
            .place
            .insert(&NewPlace::new(PlaceKind::Shop, "shop").in_node(sm.id))
            .await
            .unwrap();

        let counts = repos.place.count_by_branch(us.id).await.unwrap();
        assert_eq!(
            counts,
            vec![BranchCount {
                child_id: ca.id,
                spot_count: 2,
                shop_count: 1,
            }]
        );
    }
}
