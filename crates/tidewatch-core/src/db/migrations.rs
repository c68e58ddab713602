//! Database migrations

use crate::domains::{CurrentStations, NavUnits, TideStations, WeatherLocations};
use crate::error::Result;
use crate::models::FavoriteDomain;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// One favorites table per domain, identical shape
fn favorite_table_statements<D: FavoriteDomain>() -> [String; 3] {
    let table = D::LOCAL_TABLE;
    [
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                natural_key TEXT PRIMARY KEY,
                is_favorite INTEGER NOT NULL DEFAULT 1,
                user_id TEXT,
                device_id TEXT NOT NULL,
                last_modified INTEGER NOT NULL,
                remote_id TEXT,
                details TEXT NOT NULL DEFAULT '{{}}'
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table}(user_id)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_remote ON {table}(remote_id)"),
    ]
}

/// Migration to version 1: favorites tables and local settings
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut statements = vec![
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )"
        .to_string(),
        // Device identity and other per-installation values
        "CREATE TABLE IF NOT EXISTS local_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )"
        .to_string(),
    ];
    statements.extend(favorite_table_statements::<TideStations>());
    statements.extend(favorite_table_statements::<CurrentStations>());
    statements.extend(favorite_table_statements::<WeatherLocations>());
    statements.extend(favorite_table_statements::<NavUnits>());
    statements.push("INSERT INTO schema_version (version) VALUES (1)".to_string());

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: LWW conflict log
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            domain TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            local_modified INTEGER NOT NULL,
            remote_modified INTEGER NOT NULL,
            winner TEXT NOT NULL,
            resolved_at INTEGER NOT NULL,
            strategy TEXT NOT NULL
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_domain ON sync_conflicts(domain, natural_key)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)"
            .to_string(),
        "INSERT INTO schema_version (version) VALUES (2)".to_string(),
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

/// Run statements in one transaction, rolling back on the first failure
async fn apply(conn: &Connection, statements: &[String]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt.as_str(), ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }
    Ok(())
}
