use catalog_api::DEFAULT_REQUEST_TIMEOUT_SECS;
use clap::{Parser, Subcommand, ValueEnum};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.trim().to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "catalog-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cache-first catalog client: shows cached data, then refreshes it from the API")]
pub struct Cli {
    /// Catalog endpoint (the action parameter is added per request)
    #[arg(long, env = "CATALOG_API_URL", value_parser = non_empty_string)]
    pub api_url: String,

    /// Session token sent with every request
    #[arg(long, env = "CATALOG_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// SQLite cache file
    #[arg(long, env = "CATALOG_DB_PATH", default_value = "catalog.db")]
    pub db_path: String,

    /// Per-attempt request timeout in seconds
    #[arg(
        long,
        env = "CATALOG_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Keep the cache in memory instead of SQLite
    #[arg(long, global = true)]
    pub memory: bool,

    /// Fetch from the API before answering (bounded: loading, then one result).
    /// Without it or --watch, cached data is printed and the command exits
    /// without waiting for the background revalidation
    #[arg(long, global = true, conflicts_with = "watch")]
    pub refresh: bool,

    /// Keep following the cache until Ctrl-C
    #[arg(long, global = true)]
    pub watch: bool,

    /// Output format, one line per emission
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Organizational profile
    Profile,
    /// Product categories
    Categories,
    /// Products of one category
    Products {
        /// Category id
        #[arg(long, value_parser = non_empty_string)]
        category: String,
    },
}
