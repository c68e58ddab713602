use std::path::Path;

use tidewatch_core::config::TidewatchConfig;

use crate::commands::common::load_config;
use crate::error::CliError;

pub struct ConfigInit {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub http_timeout_secs: Option<u64>,
    pub item_concurrency: Option<usize>,
}

/// Merge `init` into the on-disk config (environment overrides are not persisted)
pub fn apply_config_init(mut config: TidewatchConfig, init: &ConfigInit) -> Result<TidewatchConfig, CliError> {
    config.supabase_url = Some(init.supabase_url.clone());
    config.supabase_anon_key = Some(init.supabase_anon_key.clone());
    if let Some(timeout) = init.http_timeout_secs {
        config.http_timeout_secs = timeout;
    }
    if let Some(concurrency) = init.item_concurrency {
        config.item_concurrency = concurrency;
    }

    config.normalize();
    config.validate().map_err(CliError::Config)?;
    if config.supabase_url.is_none() || config.supabase_anon_key.is_none() {
        return Err(CliError::Config(
            "Both --supabase-url and --supabase-anon-key must be non-empty".to_string(),
        ));
    }
    Ok(config)
}

pub fn run_config_init(init: &ConfigInit, config_path: &Path) -> Result<(), CliError> {
    let existing = TidewatchConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let config = apply_config_init(existing, init)?;
    config.save_to_path(config_path).map_err(CliError::Config)?;
    println!("Saved config to {}", config_path.display());
    Ok(())
}

pub fn run_config_show(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    Ok(())
}

/// Config with the anon key cut down to its last four characters
pub fn redacted(mut config: TidewatchConfig) -> TidewatchConfig {
    config.supabase_anon_key = config.supabase_anon_key.map(|key| {
        let tail: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    });
    config
}
