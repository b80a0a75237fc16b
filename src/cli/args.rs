//! CLI argument definitions using clap derive

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Triplog - trip logging client
///
/// Signs in to the trip service, keeps the session fresh and serves trip
/// queries from a versioned local cache.
#[derive(Parser, Debug)]
#[command(name = "triplog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TRIPLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Service base URL (overrides api.base_url)
    #[arg(long, global = true, env = "TRIPLOG_API_URL")]
    pub api_url: Option<String>,

    /// Public API key (overrides api.api_key)
    #[arg(long, global = true, env = "TRIPLOG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with a password or a one-time code
    Login(LoginArgs),

    /// Sign out and clear the local session
    Logout,

    /// Report whether a session is active and when it expires
    Status(StatusArgs),

    /// Show the signed-in user
    Whoami(WhoamiArgs),

    /// Search trips in a date range
    Trips(TripsArgs),

    /// Inspect or invalidate the local cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the login command
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Account email (prompted when omitted)
    #[arg(short, long)]
    pub email: Option<String>,

    /// Password (prompted when omitted)
    #[arg(
        short,
        long,
        env = "TRIPLOG_PASSWORD",
        hide_env_values = true,
        conflicts_with = "otp"
    )]
    pub password: Option<String>,

    /// Sign in with a one-time code sent by email
    #[arg(long)]
    pub otp: bool,

    /// One-time code already received (skips sending a new one)
    #[arg(long, requires = "otp")]
    pub code: Option<String>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print the raw status object as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the whoami command
#[derive(Parser, Debug)]
pub struct WhoamiArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the trips command
#[derive(Parser, Debug)]
pub struct TripsArgs {
    /// First day of the range (YYYY-MM-DD)
    pub start: NaiveDate,

    /// Last day of the range (YYYY-MM-DD)
    pub end: NaiveDate,

    /// Invalidate the cached range before querying
    #[arg(short, long)]
    pub refresh: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show domain versions and stored keys
    Show {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Bump a domain version, orphaning its cached entries
    Bump {
        /// Domain key (e.g. trip_2025-01-01_2025-01-31)
        key: String,
    },

    /// Reset domain versions to 1 (all domains when none are given)
    Reset {
        /// Domain keys to reset
        keys: Vec<String>,
    },

    /// Remove one cached entry
    Remove {
        /// Cache key
        key: String,
    },

    /// Remove every cached entry whose key starts with a prefix
    RemovePrefix {
        /// Key prefix (e.g. trip_)
        prefix: String,
    },

    /// Remove every cached entry and forget all versions
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api.base_url)
        key: String,

        /// Value to set
        value: String,
    },
}
