//! Database initialization and settings access
//!
//! The ingest service keeps everything in a single SQLite file: the version
//! history, the per-version material tables, the single pending slot and a
//! key-value settings table that holds the current-version pointer.

use crate::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL keeps reads (API queries) open while a promotion writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times).
///
/// Public so tests can run the production schema against `:memory:` pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_versions_table(pool).await?;
    create_materials_table(pool).await?;
    create_pending_version_table(pool).await?;
    Ok(())
}

/// Key-value settings, including the current-version pointer
async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only log of promoted releases, one row per version label
async fn create_versions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            label TEXT PRIMARY KEY,
            publish_date TEXT,
            ingested_at TEXT NOT NULL,
            materials_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Material records per promoted release.
///
/// `position` preserves the spreadsheet row order; `uuid_key` is the
/// normalized identity used for lookups and diffing.
async fn create_materials_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS materials (
            version_label TEXT NOT NULL REFERENCES versions(label) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            uuid TEXT NOT NULL,
            uuid_key TEXT NOT NULL,
            legacy_id TEXT,
            name_de TEXT,
            name_fr TEXT,
            disposal_id TEXT,
            disposal_name_de TEXT,
            disposal_name_fr TEXT,
            density TEXT,
            density_min REAL,
            density_max REAL,
            unit TEXT,
            ubp_total REAL,
            ubp_production REAL,
            ubp_disposal REAL,
            pe_total REAL,
            pe_production REAL,
            pe_production_energetic REAL,
            pe_production_material REAL,
            pe_disposal REAL,
            pe_renewable_total REAL,
            pe_renewable_production REAL,
            pe_renewable_production_energetic REAL,
            pe_renewable_production_material REAL,
            pe_renewable_disposal REAL,
            pe_non_renewable_total REAL,
            pe_non_renewable_production REAL,
            pe_non_renewable_production_energetic REAL,
            pe_non_renewable_production_material REAL,
            pe_non_renewable_disposal REAL,
            ghg_total REAL,
            ghg_production REAL,
            ghg_disposal REAL,
            biogenic_carbon REAL,
            PRIMARY KEY (version_label, uuid_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_materials_version_position
         ON materials(version_label, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-slot holding area for a release awaiting an operator decision.
/// The CHECK constraint pins the table to one row.
async fn create_pending_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version_label TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT,
            file_size_text TEXT,
            publish_date TEXT,
            filename TEXT NOT NULL,
            materials_json TEXT NOT NULL,
            staged_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (UPSERT)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Delete a setting if present
pub async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await
        .map_err(Error::Database)?;

    Ok(())
}
