//! SQLite node store.
//!
//! Uniqueness of `(parent_id, short_name)` is left to the partial unique
//! indexes so that racing writers get exactly one winner. Transactions are
//! plain deferred `BEGIN`s: SQLite takes the write lock at their first write.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

use divemap_domain::{
    AdminLevel, Coordinates, CountryCode, GeographicNode, LegacyId, NewGeographicNode, NodeId,
    NodeName, ShortName,
};

use super::{
    get_col, is_foreign_key_violation, is_unique_violation, linkage_cols, node_id_col,
    node_legacy_column,
};
use crate::infrastructure::ports::{
    BatchResult, ClockPort, CollapseOutcome, NodeRepo, RepoError,
};

const NODE_COLUMNS: &str = "id, name, short_name, google_name, google_place_id, latitude, \
    longitude, country_code, admin_level, parent_id, root_id, legacy_country_id, \
    legacy_area_one_id, legacy_area_two_id, legacy_locality_id, created_at";

const DESCENDANTS_SQL: &str = r#"
    WITH RECURSIVE subtree(id) AS (
        SELECT id FROM geographic_nodes WHERE id = ?
        UNION
        SELECT n.id FROM geographic_nodes n JOIN subtree s ON n.parent_id = s.id
    )
    SELECT id FROM subtree
"#;

// Depth is bounded by the number of levels, which also stops a corrupt
// parent cycle.
const ANCESTORS_SQL: &str = r#"
    WITH RECURSIVE chain(id, depth) AS (
        SELECT id, 0 FROM geographic_nodes WHERE id = ?
        UNION ALL
        SELECT n.parent_id, c.depth + 1
        FROM geographic_nodes n JOIN chain c ON n.id = c.id
        WHERE n.parent_id IS NOT NULL AND c.depth < 3
    )
    SELECT chain.depth AS depth, g.*
    FROM chain JOIN geographic_nodes g ON g.id = chain.id
    ORDER BY chain.depth DESC
"#;

/// SQLite implementation of [`NodeRepo`].
pub struct SqliteNodeRepo {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteNodeRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self { pool, clock }
    }

    async fn fetch_optional(
        &self,
        operation: &'static str,
        clause: &str,
        binds: &[Bind<'_>],
    ) -> Result<Option<GeographicNode>, RepoError> {
        let sql = format!(
            "SELECT {} FROM geographic_nodes WHERE {} ORDER BY id LIMIT 1",
            NODE_COLUMNS, clause
        );
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = bind.apply(query);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database(operation, e))?;
        row.as_ref().map(node_from_row).transpose()
    }

    async fn fetch_all(
        &self,
        operation: &'static str,
        clause: &str,
        binds: &[Bind<'_>],
    ) -> Result<Vec<GeographicNode>, RepoError> {
        let sql = format!(
            "SELECT {} FROM geographic_nodes WHERE {} ORDER BY admin_level, id",
            NODE_COLUMNS, clause
        );
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = bind.apply(query);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database(operation, e))?;
        rows.iter().map(node_from_row).collect()
    }

    /// Validate a new node's parent and return the root it inherits.
    async fn prepare_insert(&self, node: &NewGeographicNode) -> Result<Option<NodeId>, RepoError> {
        node.validate().map_err(RepoError::constraint)?;
        let Some(parent_id) = node.parent_id else {
            return Ok(None);
        };
        let parent = self
            .get(parent_id)
            .await?
            .ok_or_else(|| RepoError::not_found("GeographicNode", parent_id))?;
        node.check_parent(&parent).map_err(RepoError::constraint)?;
        Ok(parent.root_id)
    }
}

/// A positional bind value for the small dynamic queries above.
enum Bind<'a> {
    Int(i64),
    Text(&'a str),
}

impl Bind<'_> {
    fn apply<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            Bind::Int(value) => query.bind(*value),
            Bind::Text(value) => query.bind(*value),
        }
    }
}

fn node_from_row(row: &SqliteRow) -> Result<GeographicNode, RepoError> {
    let name = NodeName::new(get_col::<String>(row, "name")?).map_err(RepoError::serialization)?;
    let short_name =
        ShortName::new(get_col::<String>(row, "short_name")?).map_err(RepoError::serialization)?;
    let coordinates = Coordinates::from_columns(
        get_col::<Option<f64>>(row, "latitude")?,
        get_col::<Option<f64>>(row, "longitude")?,
    )
    .map_err(RepoError::serialization)?;
    let country_code = get_col::<Option<String>>(row, "country_code")?
        .map(CountryCode::new)
        .transpose()
        .map_err(RepoError::serialization)?;
    let admin_level = AdminLevel::from_depth(get_col::<i64>(row, "admin_level")?)
        .map_err(RepoError::serialization)?;

    Ok(GeographicNode {
        id: NodeId::new(get_col::<i64>(row, "id")?),
        name,
        short_name,
        google_name: get_col(row, "google_name")?,
        google_place_id: get_col(row, "google_place_id")?,
        coordinates,
        country_code,
        admin_level,
        parent_id: node_id_col(row, "parent_id")?,
        root_id: node_id_col(row, "root_id")?,
        legacy: linkage_cols(row, node_legacy_column)?,
        created_at: get_col(row, "created_at")?,
    })
}

async fn fetch_node(
    conn: &mut SqliteConnection,
    id: NodeId,
) -> Result<Option<GeographicNode>, RepoError> {
    let sql = format!("SELECT {} FROM geographic_nodes WHERE id = ?", NODE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RepoError::database("fetch_node", e))?;
    row.as_ref().map(node_from_row).transpose()
}

async fn insert_row(
    conn: &mut SqliteConnection,
    node: &NewGeographicNode,
    root_id: Option<NodeId>,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<GeographicNode, RepoError> {
    let result = sqlx::query(
        r#"
        INSERT INTO geographic_nodes (
            name, short_name, google_name, google_place_id, latitude, longitude,
            country_code, admin_level, parent_id, root_id, legacy_country_id,
            legacy_area_one_id, legacy_area_two_id, legacy_locality_id, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(node.name.as_str())
    .bind(node.short_name.as_str())
    .bind(node.google_name.as_deref())
    .bind(node.google_place_id.as_deref())
    .bind(node.coordinates.map(|c| c.latitude()))
    .bind(node.coordinates.map(|c| c.longitude()))
    .bind(node.country_code.as_ref().map(|c| c.as_str()))
    .bind(i64::from(node.admin_level.depth()))
    .bind(node.parent_id.map(NodeId::get))
    .bind(root_id.map(NodeId::get))
    .bind(node.legacy.country.map(LegacyId::get))
    .bind(node.legacy.area_one.map(LegacyId::get))
    .bind(node.legacy.area_two.map(LegacyId::get))
    .bind(node.legacy.locality.map(LegacyId::get))
    .bind(created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RepoError::duplicate_segment(node.parent_id, &node.short_name)
        } else {
            RepoError::database("insert_node", e)
        }
    })?;

    let id = NodeId::new(result.last_insert_rowid());
    fetch_node(conn, id)
        .await?
        .ok_or_else(|| RepoError::not_found("GeographicNode", id))
}

/// `UPDATE` that only succeeds when `parent` is one level above `node`.
async fn assign_parent(
    conn: &mut SqliteConnection,
    node_id: NodeId,
    parent_id: NodeId,
) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"
        UPDATE geographic_nodes
        SET parent_id = p.id, root_id = p.root_id
        FROM (SELECT id, admin_level, root_id FROM geographic_nodes WHERE id = ?1) AS p
        WHERE geographic_nodes.id = ?2 AND geographic_nodes.admin_level = p.admin_level + 1
        "#,
    )
    .bind(parent_id.get())
    .bind(node_id.get())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 1 => Ok(()),
        Ok(_) => {
            let node = fetch_node(conn, node_id)
                .await?
                .ok_or_else(|| RepoError::not_found("GeographicNode", node_id))?;
            let parent = fetch_node(conn, parent_id)
                .await?
                .ok_or_else(|| RepoError::not_found("GeographicNode", parent_id))?;
            Err(node
                .check_parent(&parent)
                .err()
                .map(RepoError::constraint)
                .unwrap_or_else(|| RepoError::database("set_parent", "no row updated")))
        }
        Err(e) if is_unique_violation(&e) => {
            let short_name = fetch_node(conn, node_id)
                .await?
                .map(|n| n.short_name.to_string())
                .unwrap_or_default();
            Err(RepoError::duplicate_segment(Some(parent_id), short_name))
        }
        Err(e) => Err(RepoError::database("set_parent", e)),
    }
}

async fn assign_root(
    conn: &mut SqliteConnection,
    node_id: NodeId,
    root_id: NodeId,
) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"
        UPDATE geographic_nodes SET root_id = ?1
        WHERE id = ?2
          AND EXISTS (SELECT 1 FROM geographic_nodes WHERE id = ?1 AND admin_level = 0)
        "#,
    )
    .bind(root_id.get())
    .bind(node_id.get())
    .execute(&mut *conn)
    .await
    .map_err(|e| RepoError::database("set_root", e))?;

    if result.rows_affected() == 1 {
        Ok(())
    } else if fetch_node(conn, node_id).await?.is_none() {
        Err(RepoError::not_found("GeographicNode", node_id))
    } else {
        Err(RepoError::constraint(format!(
            "Node {} is not a country and cannot be a root",
            root_id
        )))
    }
}

#[async_trait]
impl NodeRepo for SqliteNodeRepo {
    async fn get(&self, id: NodeId) -> Result<Option<GeographicNode>, RepoError> {
        self.fetch_optional("get_node", "id = ?", &[Bind::Int(id.get())])
            .await
    }

    async fn find_root(&self, short_name: &str) -> Result<Option<GeographicNode>, RepoError> {
        self.fetch_optional(
            "find_root",
            "parent_id IS NULL AND admin_level = 0 AND short_name = ?",
            &[Bind::Text(short_name)],
        )
        .await
    }

    async fn find_child(
        &self,
        parent_id: NodeId,
        short_name: &str,
        level: AdminLevel,
    ) -> Result<Option<GeographicNode>, RepoError> {
        self.fetch_optional(
            "find_child",
            "parent_id = ? AND short_name = ? AND admin_level = ?",
            &[
                Bind::Int(parent_id.get()),
                Bind::Text(short_name),
                Bind::Int(i64::from(level.depth())),
            ],
        )
        .await
    }

    async fn list_children(&self, parent_id: NodeId) -> Result<Vec<GeographicNode>, RepoError> {
        self.fetch_all("list_children", "parent_id = ?", &[Bind::Int(parent_id.get())])
            .await
    }

    async fn list_all(&self) -> Result<Vec<GeographicNode>, RepoError> {
        self.fetch_all("list_nodes", "1 = 1", &[]).await
    }

    async fn list_by_level(&self, level: AdminLevel) -> Result<Vec<GeographicNode>, RepoError> {
        self.fetch_all(
            "list_by_level",
            "admin_level = ?",
            &[Bind::Int(i64::from(level.depth()))],
        )
        .await
    }

    async fn find_by_legacy(
        &self,
        level: AdminLevel,
        legacy_id: LegacyId,
    ) -> Result<Option<GeographicNode>, RepoError> {
        let clause = format!("admin_level = ? AND {} = ?", node_legacy_column(level));
        self.fetch_optional(
            "find_by_legacy",
            &clause,
            &[Bind::Int(i64::from(level.depth())), Bind::Int(legacy_id.get())],
        )
        .await
    }

    async fn ancestors(&self, id: NodeId) -> Result<Vec<GeographicNode>, RepoError> {
        let rows = sqlx::query(ANCESTORS_SQL)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("ancestors", e))?;
        if rows.is_empty() {
            return Err(RepoError::not_found("GeographicNode", id));
        }
        rows.iter().map(node_from_row).collect()
    }

    async fn descendant_ids(&self, id: NodeId) -> Result<HashSet<NodeId>, RepoError> {
        let ids: Vec<i64> = sqlx::query_scalar(DESCENDANTS_SQL)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("descendant_ids", e))?;
        if ids.is_empty() {
            return Err(RepoError::not_found("GeographicNode", id));
        }
        Ok(ids.into_iter().map(NodeId::new).collect())
    }

    async fn insert(&self, node: &NewGeographicNode) -> Result<GeographicNode, RepoError> {
        let root_id = self.prepare_insert(node).await?;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepoError::database("insert_node", e))?;
        let created = insert_row(&mut conn, node, root_id, self.clock.now()).await?;
        tracing::debug!(
            node_id = %created.id,
            short_name = %created.short_name,
            admin_level = %created.admin_level,
            "Inserted geographic node"
        );
        Ok(created)
    }

    async fn insert_batch(
        &self,
        nodes: &[NewGeographicNode],
    ) -> Result<BatchResult<GeographicNode>, RepoError> {
        let mut prepared = Vec::with_capacity(nodes.len());
        for node in nodes {
            prepared.push(self.prepare_insert(node).await);
        }

        let now = self.clock.now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("insert_batch", e))?;
        let mut results = Vec::with_capacity(nodes.len());
        for (node, root) in nodes.iter().zip(prepared) {
            let result = match root {
                Ok(root_id) => insert_row(&mut tx, node, root_id, now).await,
                Err(e) => Err(e),
            };
            results.push(result);
        }
        tx.commit()
            .await
            .map_err(|e| RepoError::database("insert_batch", e))?;
        Ok(results)
    }

    async fn update(&self, node: &GeographicNode) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE geographic_nodes
            SET name = ?, short_name = ?, google_name = ?, google_place_id = ?,
                latitude = ?, longitude = ?, country_code = ?
            WHERE id = ?
            "#,
        )
        .bind(node.name.as_str())
        .bind(node.short_name.as_str())
        .bind(node.google_name.as_deref())
        .bind(node.google_place_id.as_deref())
        .bind(node.coordinates.map(|c| c.latitude()))
        .bind(node.coordinates.map(|c| c.longitude()))
        .bind(node.country_code.as_ref().map(|c| c.as_str()))
        .bind(node.id.get())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::duplicate_segment(node.parent_id, &node.short_name)
            } else {
                RepoError::database("update_node", e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("GeographicNode", node.id));
        }
        Ok(())
    }

    async fn set_parents(
        &self,
        assignments: &[(NodeId, NodeId)],
    ) -> Result<BatchResult<()>, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("set_parents", e))?;
        let mut results = Vec::with_capacity(assignments.len());
        for &(node_id, parent_id) in assignments {
            results.push(assign_parent(&mut tx, node_id, parent_id).await);
        }
        tx.commit()
            .await
            .map_err(|e| RepoError::database("set_parents", e))?;
        Ok(results)
    }

    async fn set_roots(
        &self,
        assignments: &[(NodeId, NodeId)],
    ) -> Result<BatchResult<()>, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("set_roots", e))?;
        let mut results = Vec::with_capacity(assignments.len());
        for &(node_id, root_id) in assignments {
            results.push(assign_root(&mut tx, node_id, root_id).await);
        }
        tx.commit()
            .await
            .map_err(|e| RepoError::database("set_roots", e))?;
        Ok(results)
    }

    async fn collapse_into(
        &self,
        duplicate: NodeId,
        canonical: NodeId,
    ) -> Result<CollapseOutcome, RepoError> {
        if duplicate == canonical {
            return Err(RepoError::constraint("Cannot collapse a node into itself"));
        }
        let dup = self
            .get(duplicate)
            .await?
            .ok_or_else(|| RepoError::not_found("GeographicNode", duplicate))?;
        let target = self
            .get(canonical)
            .await?
            .ok_or_else(|| RepoError::not_found("GeographicNode", canonical))?;
        if dup.admin_level != target.admin_level {
            return Err(RepoError::constraint(format!(
                "Cannot collapse {} node {} into {} node {}",
                dup.admin_level, duplicate, target.admin_level, canonical
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("collapse_into", e))?;
        let mut outcome = CollapseOutcome::default();

        for (table, counter) in [
            ("spots", &mut outcome.repointed_spots),
            ("dive_shops", &mut outcome.repointed_shops),
        ] {
            let sql = format!(
                "UPDATE {} SET geographic_node_id = ?1 WHERE geographic_node_id = ?2",
                table
            );
            *counter = sqlx::query(&sql)
                .bind(canonical.get())
                .bind(duplicate.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database("collapse_into", e))?
                .rows_affected();
        }

        // Children whose short name is free under the canonical node move
        // there; the rest are detached and wait for the next parent pass.
        outcome.detached_children = sqlx::query(
            r#"
            UPDATE geographic_nodes SET parent_id = NULL, root_id = NULL
            WHERE parent_id = ?2
              AND short_name IN (SELECT short_name FROM geographic_nodes WHERE parent_id = ?1)
            "#,
        )
        .bind(canonical.get())
        .bind(duplicate.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("collapse_into", e))?
        .rows_affected();

        outcome.moved_children = sqlx::query(
            "UPDATE geographic_nodes SET parent_id = ?1 WHERE parent_id = ?2",
        )
        .bind(canonical.get())
        .bind(duplicate.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("collapse_into", e))?
        .rows_affected();

        sqlx::query("UPDATE geographic_nodes SET root_id = ?1 WHERE root_id = ?2")
            .bind(target.root_id.map(NodeId::get))
            .bind(duplicate.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("collapse_into", e))?;

        if let Some(root_id) = target.root_id {
            sqlx::query(
                r#"
                WITH RECURSIVE subtree(id) AS (
                    SELECT id FROM geographic_nodes WHERE parent_id = ?1
                    UNION
                    SELECT n.id FROM geographic_nodes n JOIN subtree s ON n.parent_id = s.id
                )
                UPDATE geographic_nodes SET root_id = ?2
                WHERE id IN (SELECT id FROM subtree)
                "#,
            )
            .bind(canonical.get())
            .bind(root_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("collapse_into", e))?;
        }

        sqlx::query("DELETE FROM geographic_nodes WHERE id = ?")
            .bind(duplicate.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    RepoError::dependents_remain("GeographicNode", duplicate, 1)
                } else {
                    RepoError::database("collapse_into", e)
                }
            })?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("collapse_into", e))?;

        tracing::info!(
            duplicate = %duplicate,
            canonical = %canonical,
            moved = outcome.moved_children,
            detached = outcome.detached_children,
            spots = outcome.repointed_spots,
            shops = outcome.repointed_shops,
            "Collapsed duplicate node"
        );
        Ok(outcome)
    }

    async fn delete(&self, id: NodeId) -> Result<(), RepoError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM geographic_nodes WHERE parent_id = ?1)
                 + (SELECT COUNT(*) FROM geographic_nodes WHERE root_id = ?1 AND id != ?1)
                 + (SELECT COUNT(*) FROM spots WHERE geographic_node_id = ?1)
                 + (SELECT COUNT(*) FROM dive_shops WHERE geographic_node_id = ?1)
            "#,
        )
        .bind(id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::database("delete_node", e))?;
        if count > 0 {
            return Err(RepoError::dependents_remain("GeographicNode", id, count));
        }

        let result = sqlx::query("DELETE FROM geographic_nodes WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    RepoError::dependents_remain("GeographicNode", id, 1)
                } else {
                    RepoError::database("delete_node", e)
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("GeographicNode", id));
        }
        Ok(())
    }
}
