use std::path::Path;
use std::sync::Arc;

use tidewatch_core::config::TidewatchConfig;
use tidewatch_core::domains::DomainKind;
use tidewatch_core::remote::PostgrestConnector;
use tidewatch_core::sync::SyncSuite;
use tidewatch_core::SyncResult;

use crate::auth::{auth_client, supabase_project};
use crate::commands::common::{
    format_sync_conflict_lines, load_config, open_database, sync_conflict_to_item,
    SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(
    domain: Option<DomainKind>,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let suite = build_suite(&config, db_path).await?;

    let results = match domain {
        Some(domain) => vec![(domain, suite.sync_domain(domain).await)],
        None => suite.sync_all().await.results,
    };

    for (domain, result) in &results {
        for line in format_sync_result(*domain, result) {
            println!("{line}");
        }
    }

    match count_failures(&results) {
        0 => Ok(()),
        failed => Err(CliError::SyncFailed(failed)),
    }
}

async fn build_suite(config: &TidewatchConfig, db_path: &Path) -> Result<SyncSuite, CliError> {
    let (supabase_url, anon_key) = supabase_project(config)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .ok_or(CliError::SyncNotConfigured)?;
    let auth = auth_client(config)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .ok_or(CliError::SyncNotConfigured)?;
    let connector = PostgrestConnector::new(&supabase_url, anon_key, config.http_timeout())?;
    let db = open_database(db_path).await?;

    Ok(SyncSuite::new(Arc::new(auth), &db, &connector, config))
}

/// Domains whose pass ended in `Failure`; partial passes still count as synced
pub fn count_failures(results: &[(DomainKind, SyncResult)]) -> usize {
    results
        .iter()
        .filter(|(_, result)| matches!(result, SyncResult::Failure(_)))
        .count()
}

pub fn format_sync_result(domain: DomainKind, result: &SyncResult) -> Vec<String> {
    match result {
        SyncResult::Success(stats) => vec![format!("{domain}: synced ({})", summarize(stats))],
        SyncResult::PartialSuccess { stats, errors } => {
            let mut lines = vec![format!(
                "{domain}: partially synced ({}); {} item(s) failed",
                summarize(stats),
                errors.len()
            )];
            lines.extend(errors.iter().map(|error| format!("  - {error}")));
            lines
        }
        SyncResult::Failure(error) => vec![format!("{domain}: failed: {error}")],
    }
}

fn summarize(stats: &tidewatch_core::SyncStats) -> String {
    format!(
        "{} uploaded, {} downloaded, {} resolved, {} linked, {} unchanged in {} ms",
        stats.uploaded,
        stats.downloaded,
        stats.resolved,
        stats.linked,
        stats.unchanged,
        stats.duration().as_millis()
    )
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let conflicts = db.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
