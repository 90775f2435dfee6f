//! SQLite adapters for the repository ports.

mod legacy_repo;
mod node_repo;
mod place_repo;
mod schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use divemap_domain::{AdminLevel, LegacyId, LegacyLinkage, NodeId};

use crate::infrastructure::ports::{ClockPort, RepoError};

pub use legacy_repo::SqliteLegacyRepo;
pub use node_repo::SqliteNodeRepo;
pub use place_repo::SqlitePlaceRepo;
pub use schema::ensure_schema;

/// All SQLite-backed repositories, sharing one pool.
pub struct SqliteRepositories {
    pub node: Arc<SqliteNodeRepo>,
    pub legacy: Arc<SqliteLegacyRepo>,
    pub place: Arc<SqlitePlaceRepo>,
    pool: SqlitePool,
}

impl SqliteRepositories {
    /// Open (creating if missing) the database at `database_url` and make
    /// sure the schema exists.
    pub async fn connect(database_url: &str, clock: Arc<dyn ClockPort>) -> Result<Self, RepoError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RepoError::database("connect", e))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::database("connect", e))?;

        ensure_schema(&pool).await?;
        Ok(Self::new(pool, clock))
    }

    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            node: Arc::new(SqliteNodeRepo::new(pool.clone(), clock.clone())),
            legacy: Arc::new(SqliteLegacyRepo::new(pool.clone())),
            place: Arc::new(SqlitePlaceRepo::new(pool.clone(), clock)),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// =============================================================================
// Column naming per legacy level
// =============================================================================

/// Column in lower legacy tables that references the table at `level`.
pub(super) fn legacy_fk_column(level: AdminLevel) -> Option<&'static str> {
    match level {
        AdminLevel::Country => Some("country_id"),
        AdminLevel::State => Some("area_one_id"),
        AdminLevel::County => Some("area_two_id"),
        AdminLevel::City => None,
    }
}

/// Column in `spots` / `dive_shops` that references the table at `level`.
pub(super) fn place_legacy_column(level: AdminLevel) -> &'static str {
    match level {
        AdminLevel::Country => "country_id",
        AdminLevel::State => "area_one_id",
        AdminLevel::County => "area_two_id",
        AdminLevel::City => "locality_id",
    }
}

/// Column in `geographic_nodes` that references the table at `level`.
pub(super) fn node_legacy_column(level: AdminLevel) -> &'static str {
    match level {
        AdminLevel::Country => "legacy_country_id",
        AdminLevel::State => "legacy_area_one_id",
        AdminLevel::County => "legacy_area_two_id",
        AdminLevel::City => "legacy_locality_id",
    }
}

// =============================================================================
// Row decoding
// =============================================================================

pub(super) fn get_col<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, RepoError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepoError::serialization(format!("column {}: {}", column, e)))
}

pub(super) fn node_id_col(row: &SqliteRow, column: &str) -> Result<Option<NodeId>, RepoError> {
    Ok(get_col::<Option<i64>>(row, column)?.map(NodeId::new))
}

pub(super) fn legacy_id_col(row: &SqliteRow, column: &str) -> Result<Option<LegacyId>, RepoError> {
    Ok(get_col::<Option<i64>>(row, column)?.map(LegacyId::new))
}

/// Legacy linkage stored under `column_for(level)` names.
pub(super) fn linkage_cols(
    row: &SqliteRow,
    column_for: fn(AdminLevel) -> &'static str,
) -> Result<LegacyLinkage, RepoError> {
    let mut linkage = LegacyLinkage::default();
    for level in AdminLevel::ALL {
        linkage.set(level, legacy_id_col(row, column_for(level))?);
    }
    Ok(linkage)
}

/// `[1,2,3]` for binding an id set to `json_each(?)`.
pub(super) fn id_set_json(ids: impl IntoIterator<Item = i64>) -> Result<String, RepoError> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    serde_json::to_string(&ids).map_err(RepoError::serialization)
}

pub(super) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(super) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
