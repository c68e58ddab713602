use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tidewatch_core::Error),
    #[error(transparent)]
    Remote(#[from] tidewatch_core::store::RemoteStoreError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("A key is required for {0} favorites")]
    MissingKey(&'static str),
    #[error("Invalid {domain} key: '{key}'")]
    InvalidKey { domain: &'static str, key: String },
    #[error("Favorite not found: {0}")]
    FavoriteNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Sync is not configured. Run `tidewatch config init` or set TIDEWATCH_SUPABASE_URL and TIDEWATCH_SUPABASE_ANON_KEY."
    )]
    SyncNotConfigured,
    #[error("Sync failed for {0} domain(s)")]
    SyncFailed(usize),
}
