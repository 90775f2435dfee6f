//! Schema for the node tree, the legacy flat tables and places.
//!
//! Every statement is idempotent and runs at startup.

use sqlx::SqlitePool;

use crate::infrastructure::ports::RepoError;

const STATEMENTS: &[&str] = &[
    // Legacy flat tables. Foreign keys are plain columns: the legacy data
    // never enforced them and the migrator has to read it as it is.
    r#"
    CREATE TABLE IF NOT EXISTS country (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS area_one (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        country_id INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS area_two (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        country_id INTEGER,
        area_one_id INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locality (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        country_id INTEGER,
        area_one_id INTEGER,
        area_two_id INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS geographic_nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        google_name TEXT,
        google_place_id TEXT,
        latitude REAL,
        longitude REAL,
        country_code TEXT,
        admin_level INTEGER NOT NULL CHECK (admin_level BETWEEN 0 AND 3),
        parent_id INTEGER REFERENCES geographic_nodes(id),
        root_id INTEGER REFERENCES geographic_nodes(id),
        legacy_country_id INTEGER,
        legacy_area_one_id INTEGER,
        legacy_area_two_id INTEGER,
        legacy_locality_id INTEGER,
        created_at TEXT NOT NULL,
        CHECK (admin_level > 0 OR parent_id IS NULL)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_geographic_nodes_parent_short_name
        ON geographic_nodes (parent_id, short_name)
        WHERE parent_id IS NOT NULL
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_geographic_nodes_country_short_name
        ON geographic_nodes (short_name)
        WHERE parent_id IS NULL AND admin_level = 0
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_geographic_nodes_parent
        ON geographic_nodes (parent_id)
    "#,
    // A country is its own root. Setting it in a trigger keeps the insert a
    // single statement.
    r#"
    CREATE TRIGGER IF NOT EXISTS geographic_nodes_country_root
    AFTER INSERT ON geographic_nodes
    WHEN NEW.admin_level = 0 AND NEW.parent_id IS NULL AND NEW.root_id IS NULL
    BEGIN
        UPDATE geographic_nodes SET root_id = NEW.id WHERE id = NEW.id;
    END
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS spots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        geographic_node_id INTEGER REFERENCES geographic_nodes(id),
        country_id INTEGER,
        area_one_id INTEGER,
        area_two_id INTEGER,
        locality_id INTEGER,
        avg_rating REAL NOT NULL DEFAULT 0,
        num_reviews INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_spots_node ON spots (geographic_node_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dive_shops (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        geographic_node_id INTEGER REFERENCES geographic_nodes(id),
        country_id INTEGER,
        area_one_id INTEGER,
        area_two_id INTEGER,
        locality_id INTEGER,
        avg_rating REAL NOT NULL DEFAULT 0,
        num_reviews INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_dive_shops_node ON dive_shops (geographic_node_id)
    "#,
];

/// Create tables, indexes and triggers that do not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepoError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| RepoError::database("ensure_schema", e))?;
    }
    tracing::debug!(statements = STATEMENTS.len(), "SQLite schema ensured");
    Ok(())
}
