use std::env;
use std::path::{Path, PathBuf};

use tidewatch_core::config::TidewatchConfig;
use tidewatch_core::models::{SyncConflict, Winner};
use tidewatch_core::services::DatabaseService;
use serde::Serialize;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "TIDEWATCH_DB_PATH";
pub const CONFIG_PATH_ENV: &str = "TIDEWATCH_CONFIG";

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub domain: String,
    pub key: String,
    pub local_modified: i64,
    pub remote_modified: i64,
    pub winner: Winner,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        domain: conflict.domain.clone(),
        key: conflict.natural_key.clone(),
        local_modified: conflict.local_modified,
        remote_modified: conflict.remote_modified,
        winner: conflict.winner,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<17}  {:<6}  key={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.domain,
                conflict.winner,
                conflict.natural_key,
                conflict.local_modified,
                conflict.remote_modified
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    resolve_path(cli_db_path, DB_PATH_ENV, default_db_path)
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    resolve_path(cli_config_path, CONFIG_PATH_ENV, default_config_path)
}

fn resolve_path(
    explicit: Option<PathBuf>,
    env_name: &str,
    fallback: fn() -> Option<PathBuf>,
) -> Result<PathBuf, CliError> {
    explicit
        .or_else(|| env::var_os(env_name).map(PathBuf::from))
        .or_else(fallback)
        .ok_or_else(|| {
            CliError::Config(format!(
                "Could not determine a default location; pass a path or set {env_name}"
            ))
        })
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("tidewatch").join("tidewatch.db"))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tidewatch").join("config.json"))
}

/// Config file merged with environment overrides, validated
pub fn load_config(config_path: &Path) -> Result<TidewatchConfig, CliError> {
    let config = TidewatchConfig::load_from_path(config_path)
        .map_err(CliError::Config)?
        .with_env_overrides(|name| env::var(name).ok());
    config.validate().map_err(CliError::Config)?;
    Ok(config)
}

pub async fn open_database(db_path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(db_path).await?)
}
