//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod parse;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use resdex_scrape::Settings;

use scrape::OutputFormat;

#[derive(Parser)]
#[command(name = "resdex")]
#[command(about = "Scrape candidate profiles from a captured Resdex search session")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML or JSON). Falls back to $RESDEX_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scrape job and print its result as JSON
    Scrape {
        /// Captured search request: a file, or "-" for stdin
        #[arg(short, long)]
        capture: String,
        /// Number of profiles to fetch
        #[arg(short = 'n', long)]
        target: usize,
        /// Profile fetch workers (default from settings)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Proxy URL (http, https or socks5)
        #[arg(long)]
        proxy: Option<String>,
        /// Delay between result pages in milliseconds
        #[arg(long)]
        page_delay_ms: Option<u64>,
        /// Delay before each profile request in milliseconds
        #[arg(long)]
        profile_delay_ms: Option<u64>,
        /// Retries for transient profile failures
        #[arg(long)]
        max_retries: Option<u32>,
        /// Output shape
        #[arg(short, long, value_enum, default_value = "records")]
        format: OutputFormat,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a captured request and show what would be replayed
    Parse {
        /// Captured search request: a file, or "-" for stdin
        #[arg(short, long)]
        capture: String,
    },

    /// Start the HTTP API
    Serve {
        /// Address to bind (default from settings)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (default from settings)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective settings as TOML
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape {
            capture,
            target,
            workers,
            proxy,
            page_delay_ms,
            profile_delay_ms,
            max_retries,
            format,
            output,
        } => {
            let args = scrape::ScrapeArgs {
                capture,
                target,
                workers,
                proxy,
                page_delay_ms,
                profile_delay_ms,
                max_retries,
                format,
                output,
            };
            scrape::cmd_scrape(settings, args).await
        }
        Commands::Parse { capture } => parse::cmd_parse(&settings, &capture),
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            serve::cmd_serve(settings, &host, port).await
        }
        Commands::Config => config_cmd::cmd_config(&settings),
    }
}
