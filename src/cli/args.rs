use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

#[derive(Parser)]
#[command(name = "x509keyserver")]
#[command(version = "1.0.0")]
#[command(about = "Look up X.509 certificates by serial number")]
#[command(long_about = None)]
pub struct Cli {
    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve certificates over HTTP from an in-memory store
    Serve {
        /// YAML configuration file
        #[arg(long, env = "X509KEYSERVER_CONFIG")]
        config: Option<PathBuf>,

        /// Address to listen on (overrides the configuration file)
        #[arg(long, env = "X509KEYSERVER_BIND")]
        bind: Option<SocketAddr>,

        /// PEM or DER certificate to load at startup (repeatable)
        #[arg(long = "certificate", value_hint = clap::ValueHint::FilePath)]
        certificates: Vec<PathBuf>,
    },
    /// Fetch certificates through the caching client
    Fetch {
        /// Key server URL
        #[arg(long, env = "X509KEYSERVER_URL", default_value = crate::config::DEFAULT_SERVER_URL)]
        server: Url,

        /// Comma-separated list of certificate indices to fetch
        #[arg(long)]
        ids: String,

        /// Maximum number of certificates to keep in the cache (negative disables pruning)
        #[arg(long, default_value_t = crate::config::DEFAULT_MAX_CACHE_SIZE, allow_negative_numbers = true)]
        max_cache_records: i64,

        /// Pause between individual fetches, in milliseconds
        #[arg(long, default_value_t = 0)]
        fetch_interval_ms: u64,

        /// Pause between two cache prunes, in milliseconds
        #[arg(long, default_value_t = 1000)]
        cache_prune_interval_ms: u64,

        /// Upper bound on each server call, in milliseconds
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,
    },
    /// List certificates known to the key server
    List {
        /// Key server URL
        #[arg(long, env = "X509KEYSERVER_URL", default_value = crate::config::DEFAULT_SERVER_URL)]
        server: Url,

        /// First index to list
        #[arg(long, default_value_t = 0)]
        start_index: u64,

        /// Maximum number of records
        #[arg(long, default_value_t = crate::rpc::DEFAULT_LIST_COUNT)]
        count: i32,

        /// Columns to display (index, subject, issuer, expires, expired); prefix with + to
        /// append to the defaults
        #[arg(long)]
        columns: Option<String>,

        /// Output raw tab-separated values (no formatting)
        #[arg(short, long)]
        raw: bool,
    },
}
