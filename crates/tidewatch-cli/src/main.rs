//! Tidewatch CLI - favorites and sync from the terminal

mod auth;
mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AuthCommands, Cli, Commands, ConfigCommands, FavoriteCommands, SyncCommands};
use crate::commands::auth_cmd::{run_auth_login, run_auth_logout, run_auth_status};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::config::{run_config_init, run_config_show, ConfigInit};
use crate::commands::favorite::{run_favorite_add, run_favorite_list, run_favorite_remove};
use crate::commands::sync::{run_sync, run_sync_conflicts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tidewatch=info,tidewatch_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;
    let config_path = resolve_config_path(cli.config)?;

    match cli.command {
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add {
                domain,
                key,
                details,
            } => run_favorite_add(domain, key.as_deref(), &details, &db_path, &config_path).await,
            FavoriteCommands::Remove { domain, key } => {
                run_favorite_remove(domain, &key, &db_path, &config_path).await
            }
            FavoriteCommands::List { domain, json } => {
                run_favorite_list(domain, json, &db_path).await
            }
        },
        Commands::Sync { domain, command } => match command {
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(limit, json, &db_path).await
            }
            None => run_sync(domain, &db_path, &config_path).await,
        },
        Commands::Auth { command } => match command {
            AuthCommands::Login { email, password } => {
                run_auth_login(&email, &password, &config_path).await
            }
            AuthCommands::Status => run_auth_status(&config_path),
            AuthCommands::Logout => run_auth_logout(&config_path).await,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Init {
                supabase_url,
                supabase_anon_key,
                http_timeout_secs,
                item_concurrency,
            } => run_config_init(
                &ConfigInit {
                    supabase_url,
                    supabase_anon_key,
                    http_timeout_secs,
                    item_concurrency,
                },
                &config_path,
            ),
            ConfigCommands::Show => run_config_show(&config_path),
        },
    }
}
