//! Database initialization
//!
//! Opens (or creates) the SQLite database, creates every table idempotently
//! and seeds the system default terminology. Safe to call on every startup.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::defaults::system_default_entries;
use crate::entity::EntityType;
use crate::Result;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_terminology(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_entity_tables(pool).await?;
    create_terminology_entries_table(pool).await?;
    create_terminology_settings_table(pool).await?;
    create_ab_tables(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Tenancy tables; each row links to its parent level
async fn create_entity_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS partners (
            guid TEXT PRIMARY KEY,
            name TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            guid TEXT PRIMARY KEY,
            name TEXT,
            partner_id TEXT REFERENCES partners(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            guid TEXT PRIMARY KEY,
            name TEXT,
            organization_id TEXT REFERENCES organizations(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            guid TEXT PRIMARY KEY,
            name TEXT,
            company_id TEXT REFERENCES companies(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            name TEXT,
            team_id TEXT REFERENCES teams(guid) ON DELETE SET NULL,
            company_id TEXT REFERENCES companies(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_terminology_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS terminology_entries (
            guid TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            override_behavior TEXT NOT NULL DEFAULT 'replace'
                CHECK (override_behavior IN ('replace', 'merge', 'suggest')),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (entity_type, entity_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_terminology_entries_entity ON terminology_entries(entity_type, entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_terminology_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS terminology_settings (
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (entity_type, entity_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ab_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ab_assignments (
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            test_id TEXT NOT NULL,
            variant TEXT NOT NULL,
            assigned_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (entity_type, entity_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ab_variants (
            test_id TEXT NOT NULL,
            variant TEXT NOT NULL,
            terms TEXT NOT NULL,
            PRIMARY KEY (test_id, variant)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed missing system default entries
///
/// Existing system entries are never overwritten, so edited defaults
/// survive restarts.
async fn init_default_terminology(pool: &SqlitePool) -> Result<()> {
    let entries = system_default_entries();
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for entry in &entries {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO terminology_entries
                (guid, entity_type, entity_id, key, value, override_behavior)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(EntityType::System.as_str())
        .bind(&entry.entity_id)
        .bind(&entry.key)
        .bind(serde_json::to_string(&entry.value)?)
        .bind(entry.override_behavior.as_str())
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;

    info!(
        "Default terminology initialized ({} of {} entries newly seeded)",
        inserted,
        entries.len()
    );
    Ok(())
}
