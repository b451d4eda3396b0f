//! proxc command line entry point.
//!
//! Logging goes to stderr as JSON so stdout carries only bodies and reports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxc_core::CacheConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "proxc")]
#[command(version, about = "Persistent HTTP response cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the cache
    Fetch {
        url: String,

        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Accept-Encoding sent with the request
        #[arg(long, default_value = "identity")]
        accept_encoding: String,

        /// Write the body as delivered, without decoding it
        #[arg(long)]
        raw: bool,
    },

    /// Print a cached record as JSON
    Show {
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },

    /// Remove a cached record
    Delete {
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },

    /// List cached records of one host
    Ls {
        host: String,

        /// Maximum number of records
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Print a stored file and the URLs referring to it
    File {
        /// Content hash
        hash: String,

        /// Also write the file body to this path
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = CacheConfig::load().context("loading configuration")?;
    config.validate()?;
    tracing::debug!(db_dir = %config.db_dir.display(), in_memory = config.in_memory, "configuration loaded");

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Fetch { url, method, accept_encoding, raw } => {
            let target = commands::Target::parse(&method, &url)?;
            commands::fetch(&config, &target, &accept_encoding, raw, &mut std::io::stderr(), &mut stdout).await
        }
        Commands::Show { url, method } => {
            let cache = proxc_core::HttpCache::from_config(&config);
            commands::show(&cache, &commands::Target::parse(&method, &url)?, &mut stdout).await
        }
        Commands::Delete { url, method } => {
            let cache = proxc_core::HttpCache::from_config(&config);
            commands::delete(&cache, &commands::Target::parse(&method, &url)?, &mut stdout).await
        }
        Commands::Ls { host, limit } => {
            let cache = proxc_core::HttpCache::from_config(&config);
            commands::list(&cache, &host, limit, &mut stdout).await
        }
        Commands::File { hash, output } => {
            let cache = proxc_core::HttpCache::from_config(&config);
            commands::file(&cache, &hash, output.as_deref(), &mut stdout).await
        }
        Commands::Config => commands::print_config(&config, &mut stdout),
    }
}
