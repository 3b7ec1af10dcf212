//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas,
//! creates every table idempotently and seeds default settings. Safe to call
//! on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets dashboard reads proceed while a review transaction writes
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
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

    prepare_schema(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database with the full schema (tests, demos)
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    // Each in-memory connection is a separate database, so keep exactly one
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    prepare_schema(&pool).await?;
    Ok(pool)
}

async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_collectors_table(pool).await?;
    create_assets_table(pool).await?;
    create_visit_reports_table(pool).await?;
    create_payment_reports_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)")
        .bind(SCHEMA_VERSION)
        .bind(crate::time::now())
        .execute(pool)
        .await?;

    init_default_settings(pool).await
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
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

async fn create_collectors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collectors (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            region TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_assets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            guid TEXT PRIMARY KEY,
            account_number TEXT NOT NULL UNIQUE,
            debtor_name TEXT NOT NULL,
            debtor_phone TEXT NOT NULL,
            debtor_id_number TEXT,
            address TEXT,
            region TEXT NOT NULL,
            product TEXT NOT NULL,
            balance_cents INTEGER NOT NULL CHECK (balance_cents > 0),
            collected_cents INTEGER NOT NULL DEFAULT 0 CHECK (collected_cents >= 0),
            status TEXT NOT NULL CHECK (status IN ('unassigned', 'assigned', 'promised', 'settled', 'closed')),
            collector_id TEXT REFERENCES collectors(guid),
            assigned_at TEXT,
            latitude REAL,
            longitude REAL,
            due_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_collector ON assets(collector_id, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_status ON assets(status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_visit_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS visit_reports (
            guid TEXT PRIMARY KEY,
            asset_id TEXT NOT NULL REFERENCES assets(guid),
            collector_id TEXT NOT NULL REFERENCES collectors(guid),
            outcome TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            visited_at TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            promised_amount_cents INTEGER,
            promised_date TEXT,
            photo_ref TEXT,
            validation TEXT NOT NULL DEFAULT 'pending' CHECK (validation IN ('pending', 'approved', 'rejected')),
            flags TEXT NOT NULL DEFAULT '[]',
            reviewed_by TEXT,
            reviewed_at TEXT,
            review_note TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_visit_reports_queue ON visit_reports(validation, submitted_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_payment_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_reports (
            guid TEXT PRIMARY KEY,
            asset_id TEXT NOT NULL REFERENCES assets(guid),
            collector_id TEXT NOT NULL REFERENCES collectors(guid),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            method TEXT NOT NULL,
            reference TEXT NOT NULL,
            paid_at TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            receipt_ref TEXT,
            validation TEXT NOT NULL DEFAULT 'pending' CHECK (validation IN ('pending', 'approved', 'rejected')),
            flags TEXT NOT NULL DEFAULT '[]',
            reviewed_by TEXT,
            reviewed_at TEXT,
            review_note TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_payment_reports_queue ON payment_reports(validation, submitted_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_payment_reports_reference ON payment_reports(reference)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all runtime settings exist. NULL values are reset to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Evidence heuristics
    ensure_setting(pool, "max_report_delay_minutes", "30").await?;
    ensure_setting(pool, "max_visit_distance_meters", "500").await?;
    ensure_setting(pool, "future_tolerance_minutes", "5").await?;

    // Event bus
    ensure_setting(pool, "event_bus_capacity", "256").await?;

    // Letters
    ensure_setting(pool, "demand_letter_notice_days", "14").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE: two services may initialize the same file
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
