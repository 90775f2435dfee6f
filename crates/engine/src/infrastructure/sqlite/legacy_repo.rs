//! SQLite access to the legacy flat tables.
//!
//! The four tables share `id, name, short_name` and differ only in which
//! foreign-key columns they carry, so every query is built from the level.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};

use divemap_domain::{AdminLevel, LegacyId, LegacyRow, LegacyRowPatch, NewLegacyRow};

use super::{
    get_col, is_unique_violation, legacy_fk_column, legacy_id_col, node_legacy_column,
    place_legacy_column,
};
use crate::infrastructure::ports::{DependentCounts, LegacyMergeOutcome, LegacyRepo, RepoError};

const PLACE_TABLES: [&str; 2] = ["spots", "dive_shops"];

/// SQLite implementation of [`LegacyRepo`].
pub struct SqliteLegacyRepo {
    pool: SqlitePool,
}

impl SqliteLegacyRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Foreign-key columns the table at `level` has, top first.
fn fk_columns(level: AdminLevel) -> Vec<&'static str> {
    level.ancestors().filter_map(legacy_fk_column).collect()
}

/// Uniform projection: columns the table lacks come back as NULL.
fn select_sql(level: AdminLevel) -> String {
    let present = fk_columns(level);
    let projection: Vec<String> = ["country_id", "area_one_id", "area_two_id"]
        .into_iter()
        .map(|column| {
            if present.contains(&column) {
                column.to_string()
            } else {
                format!("NULL AS {}", column)
            }
        })
        .collect();
    format!(
        "SELECT id, name, short_name, {} FROM {}",
        projection.join(", "),
        level.legacy_name()
    )
}

fn row_from_sql(level: AdminLevel, row: &SqliteRow) -> Result<LegacyRow, RepoError> {
    Ok(LegacyRow {
        level,
        id: LegacyId::new(get_col::<i64>(row, "id")?),
        name: get_col(row, "name")?,
        short_name: get_col(row, "short_name")?,
        country_id: legacy_id_col(row, "country_id")?,
        area_one_id: legacy_id_col(row, "area_one_id")?,
        area_two_id: legacy_id_col(row, "area_two_id")?,
    })
}

/// Every reference to legacy row `id` of the table at `level`.
async fn count_references(
    conn: &mut SqliteConnection,
    level: AdminLevel,
    id: LegacyId,
) -> Result<DependentCounts, RepoError> {
    let mut counts = DependentCounts::default();

    if let Some(fk) = legacy_fk_column(level) {
        for lower in level.descendants() {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?",
                lower.legacy_name(),
                fk
            );
            counts.legacy_rows += scalar(conn, &sql, id).await?;
        }
    }

    let place_column = place_legacy_column(level);
    counts.spots = scalar(
        conn,
        &format!("SELECT COUNT(*) FROM spots WHERE {} = ?", place_column),
        id,
    )
    .await?;
    counts.shops = scalar(
        conn,
        &format!("SELECT COUNT(*) FROM dive_shops WHERE {} = ?", place_column),
        id,
    )
    .await?;
    counts.nodes = scalar(
        conn,
        &format!(
            "SELECT COUNT(*) FROM geographic_nodes WHERE {} = ?",
            node_legacy_column(level)
        ),
        id,
    )
    .await?;

    Ok(counts)
}

async fn scalar(conn: &mut SqliteConnection, sql: &str, id: LegacyId) -> Result<i64, RepoError> {
    sqlx::query_scalar(sql)
        .bind(id.get())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepoError::database("count_legacy_references", e))
}

async fn repoint(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    from: LegacyId,
    to: LegacyId,
) -> Result<u64, RepoError> {
    let sql = format!("UPDATE {} SET {} = ?1 WHERE {} = ?2", table, column, column);
    Ok(sqlx::query(&sql)
        .bind(to.get())
        .bind(from.get())
        .execute(&mut *conn)
        .await
        .map_err(|e| RepoError::database("merge_legacy_duplicate", e))?
        .rows_affected())
}

#[async_trait]
impl LegacyRepo for SqliteLegacyRepo {
    async fn list(&self, level: AdminLevel) -> Result<Vec<LegacyRow>, RepoError> {
        let sql = format!("{} ORDER BY id", select_sql(level));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_legacy", e))?;
        rows.iter().map(|row| row_from_sql(level, row)).collect()
    }

    async fn list_all(&self) -> Result<Vec<LegacyRow>, RepoError> {
        let mut all = Vec::new();
        for level in AdminLevel::ALL {
            all.extend(self.list(level).await?);
        }
        Ok(all)
    }

    async fn get(&self, level: AdminLevel, id: LegacyId) -> Result<Option<LegacyRow>, RepoError> {
        let sql = format!("{} WHERE id = ?", select_sql(level));
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_legacy", e))?;
        row.as_ref().map(|row| row_from_sql(level, row)).transpose()
    }

    async fn insert(&self, row: &NewLegacyRow) -> Result<LegacyRow, RepoError> {
        row.validate().map_err(RepoError::constraint)?;

        let fks = fk_columns(row.level);
        let mut columns = vec!["id", "name", "short_name"];
        columns.extend(fks.iter().copied());
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            row.level.legacy_name(),
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(row.id.map(LegacyId::get))
            .bind(row.name.as_str())
            .bind(row.short_name.as_str());
        for column in &fks {
            let value = match *column {
                "country_id" => row.country_id,
                "area_one_id" => row.area_one_id,
                _ => row.area_two_id,
            };
            query = query.bind(value.map(LegacyId::get));
        }

        let result = query.execute(&self.pool).await.map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::constraint(format!(
                    "{} row {} already exists",
                    row.level.legacy_name(),
                    row.id.map(|id| id.to_string()).unwrap_or_default()
                ))
            } else {
                RepoError::database("insert_legacy", e)
            }
        })?;

        let id = LegacyId::new(result.last_insert_rowid());
        self.get(row.level, id)
            .await?
            .ok_or_else(|| RepoError::not_found("LegacyRow", id))
    }

    async fn patch(
        &self,
        level: AdminLevel,
        id: LegacyId,
        patch: &LegacyRowPatch,
    ) -> Result<LegacyRow, RepoError> {
        let mut row = self
            .get(level, id)
            .await?
            .ok_or_else(|| RepoError::not_found(level.legacy_name(), id))?;
        patch.apply(&mut row).map_err(RepoError::constraint)?;

        let fks = fk_columns(level);
        let mut assignments = vec!["name = ?".to_string(), "short_name = ?".to_string()];
        assignments.extend(fks.iter().map(|column| format!("{} = ?", column)));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            level.legacy_name(),
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql)
            .bind(row.name.as_str())
            .bind(row.short_name.as_str());
        for column in &fks {
            let value = match *column {
                "country_id" => row.country_id,
                "area_one_id" => row.area_one_id,
                _ => row.area_two_id,
            };
            query = query.bind(value.map(LegacyId::get));
        }
        query
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("patch_legacy", e))?;

        tracing::info!(table = level.legacy_name(), id = %id, "Patched legacy row");
        Ok(row)
    }

    async fn count_dependents(
        &self,
        level: AdminLevel,
        id: LegacyId,
    ) -> Result<DependentCounts, RepoError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepoError::database("count_legacy_dependents", e))?;
        count_references(&mut conn, level, id).await
    }

    async fn merge_duplicate(
        &self,
        level: AdminLevel,
        duplicate: LegacyId,
        canonical: LegacyId,
    ) -> Result<LegacyMergeOutcome, RepoError> {
        if duplicate == canonical {
            return Err(RepoError::constraint("Cannot merge a legacy row into itself"));
        }
        for id in [duplicate, canonical] {
            if self.get(level, id).await?.is_none() {
                return Err(RepoError::not_found(level.legacy_name(), id));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("merge_legacy_duplicate", e))?;
        let mut outcome = LegacyMergeOutcome::default();

        if let Some(fk) = legacy_fk_column(level) {
            for lower in level.descendants() {
                outcome.legacy_rows +=
                    repoint(&mut tx, lower.legacy_name(), fk, duplicate, canonical).await?;
            }
        }
        let place_column = place_legacy_column(level);
        outcome.spots = repoint(&mut tx, PLACE_TABLES[0], place_column, duplicate, canonical).await?;
        outcome.shops = repoint(&mut tx, PLACE_TABLES[1], place_column, duplicate, canonical).await?;
        outcome.nodes = repoint(
            &mut tx,
            "geographic_nodes",
            node_legacy_column(level),
            duplicate,
            canonical,
        )
        .await?;

        let remaining = count_references(&mut tx, level, duplicate).await?.total();
        if remaining > 0 {
            tx.rollback()
                .await
                .map_err(|e| RepoError::database("merge_legacy_duplicate", e))?;
            return Err(RepoError::dependents_remain(
                level.legacy_name(),
                duplicate,
                remaining,
            ));
        }

        let sql = format!("DELETE FROM {} WHERE id = ?", level.legacy_name());
        sqlx::query(&sql)
            .bind(duplicate.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("merge_legacy_duplicate", e))?;
        tx.commit()
            .await
            .map_err(|e| RepoError::database("merge_legacy_duplicate", e))?;

        tracing::info!(
            table = level.legacy_name(),
            duplicate = %duplicate,
            canonical = %canonical,
            legacy_rows = outcome.legacy_rows,
            spots = outcome.spots,
            shops = outcome.shops,
            nodes = outcome.nodes,
            "Merged duplicate legacy row"
        );
        Ok(outcome)
    }

    async fn delete(&self, level: AdminLevel, id: LegacyId) -> Result<(), RepoError> {
        let remaining = self.count_dependents(level, id).await?.total();
        if remaining > 0 {
            return Err(RepoError::dependents_remain(level.legacy_name(), id, remaining));
        }
        let sql = format!("DELETE FROM {} WHERE id = ?", level.legacy_name());
        let result = sqlx::query(&sql)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("delete_legacy", e))?;
        if result.rows_affected() == 0 {
            return Err(RepoError::not_found(level.legacy_name(), id));
        }
        Ok(())
    }
}
