use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tidewatch_core::domains::DomainKind;

#[derive(Parser)]
#[command(name = "tidewatch")]
#[command(about = "Tide, current, weather and nav unit favorites from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage local favorites
    #[command(alias = "fav")]
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Sync favorites with the remote store
    #[command(args_conflicts_with_subcommands = true)]
    Sync {
        /// Only sync this domain (tide, current, weather, nav)
        #[arg(value_parser = parse_domain)]
        domain: Option<DomainKind>,
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Sign in and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage the Supabase connection settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum FavoriteCommands {
    /// Mark an entity as favorite (creates or updates the local row)
    Add {
        /// Favorite domain (tide, current, weather, nav)
        #[arg(value_parser = parse_domain)]
        domain: DomainKind,
        /// Natural key; optional for weather, where a new location id is generated
        key: Option<String>,
        #[command(flatten)]
        details: DetailArgs,
    },
    /// Un-favorite an entity
    #[command(alias = "rm")]
    Remove {
        #[arg(value_parser = parse_domain)]
        domain: DomainKind,
        key: String,
    },
    /// List favorites of one domain
    List {
        #[arg(value_parser = parse_domain)]
        domain: DomainKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Display fields stored alongside a favorite
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct DetailArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    /// Current station bin depth
    #[arg(long)]
    pub depth: Option<f64>,
    /// Current station depth unit or reference
    #[arg(long)]
    pub depth_type: Option<String>,
    /// Nav unit facility type
    #[arg(long)]
    pub facility_type: Option<String>,
}

impl DetailArgs {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.depth.is_none()
            && self.depth_type.is_none()
            && self.facility_type.is_none()
    }
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with Supabase email/password and store the session in the keychain
    Login {
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show the stored session
    Status,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write Supabase connection settings to the config file
    Init {
        #[arg(long)]
        supabase_url: String,
        #[arg(long)]
        supabase_anon_key: String,
        /// HTTP timeout in seconds for remote calls
        #[arg(long)]
        http_timeout_secs: Option<u64>,
        /// Items processed concurrently within one sync phase
        #[arg(long)]
        item_concurrency: Option<usize>,
    },
    /// Print the effective configuration
    Show,
}

fn parse_domain(raw: &str) -> Result<DomainKind, String> {
    raw.parse()
}
