//! Client configuration.
//!
//! `TidewatchConfig` holds the public Supabase endpoint/key pair plus sync
//! tuning. It is stored as JSON on disk and can be overridden from the
//! environment. Secret credentials never live here; sessions go to the
//! platform keychain.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domains::DomainKind;
use crate::util::{is_http_url, normalize_text_option};

pub const SUPABASE_URL_ENV: &str = "TIDEWATCH_SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "TIDEWATCH_SUPABASE_ANON_KEY";

const CONFIG_VERSION: u32 = 1;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_ITEM_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TidewatchConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Items processed concurrently within one sync phase
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,
    /// Per-domain tolerance overrides in milliseconds, keyed by domain name
    #[serde(default)]
    pub tolerance_overrides_ms: BTreeMap<String, i64>,
}

const fn default_config_version() -> u32 {
    CONFIG_VERSION
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

const fn default_item_concurrency() -> usize {
    DEFAULT_ITEM_CONCURRENCY
}

impl Default for TidewatchConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            supabase_url: None,
            supabase_anon_key: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            item_concurrency: DEFAULT_ITEM_CONCURRENCY,
            tolerance_overrides_ms: BTreeMap::new(),
        }
    }
}

/// Tuning handed to each sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Overrides the domain's built-in tolerance when set
    pub tolerance_ms: Option<i64>,
    pub item_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance_ms: None,
            item_concurrency: DEFAULT_ITEM_CONCURRENCY,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub const fn with_tolerance_ms(mut self, tolerance_ms: i64) -> Self {
        self.tolerance_ms = Some(tolerance_ms);
        self
    }

    #[must_use]
    pub const fn with_item_concurrency(mut self, item_concurrency: usize) -> Self {
        self.item_concurrency = item_concurrency;
        self
    }
}

impl TidewatchConfig {
    /// Load config from `path`, returning defaults when the file is missing.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let raw = serde_json::to_string_pretty(self)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, raw)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(SUPABASE_URL_ENV)) {
            self.supabase_url = Some(url);
        }
        if let Some(anon_key) = normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV)) {
            self.supabase_anon_key = Some(anon_key);
        }
        self
    }

    pub fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        self.item_concurrency = self.item_concurrency.max(1);
        self.tolerance_overrides_ms
            .retain(|domain, tolerance| !domain.trim().is_empty() && *tolerance >= 0);
    }

    /// Check URL shape and tolerance override keys.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.supabase_url {
            if !is_http_url(url) {
                return Err("supabase_url must include http:// or https://".to_string());
            }
        }
        for domain in self.tolerance_overrides_ms.keys() {
            domain
                .parse::<DomainKind>()
                .map_err(|error| format!("tolerance_overrides_ms: {error}"))?;
        }
        Ok(())
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn engine_settings(&self, domain: DomainKind) -> EngineSettings {
        let tolerance_ms = self
            .tolerance_overrides_ms
            .iter()
            .find(|(name, _)| name.parse::<DomainKind>().ok() == Some(domain))
            .map(|(_, tolerance)| *tolerance);

        EngineSettings {
            tolerance_ms,
            item_concurrency: self.item_concurrency.max(1),
        }
    }
}
