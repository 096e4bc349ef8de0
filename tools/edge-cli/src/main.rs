//! Edge CLI - Command line tool for the edge request-security pipeline.
//!
//! Commands:
//! - `edge headers` - Run the pipeline for a path and print the headers
//! - `edge cache` - Show the cache policy resolved for a path
//! - `edge nonce` - Mint CSP nonces
//! - `edge config` - Show or validate the effective configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use edge_sdk::edge_observability::{init_logging, LogFormat, LogLevel};

use commands::{CacheArgs, ConfigArgs, HeadersArgs, NonceArgs};

/// Edge CLI - Inspect CSP, cache and security headers for edge routes
#[derive(Parser)]
#[command(name = "edge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a request path
    Headers(HeadersArgs),

    /// Show the cache policy for a request path
    Cache(CacheArgs),

    /// Mint CSP nonces
    Nonce(NonceArgs),

    /// Show or validate configuration
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (format, level) = match (cli.json, cli.verbose) {
        (true, true) => (LogFormat::Json, LogLevel::Debug),
        (true, false) => (LogFormat::Json, LogLevel::Warn),
        (false, true) => (LogFormat::Human, LogLevel::Debug),
        (false, false) => (LogFormat::Human, LogLevel::Warn),
    };
    init_logging(format, level)?;

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    // Execute command
    let result = match cli.command {
        Commands::Headers(args) => commands::headers::run(args, &ctx),
        Commands::Cache(args) => commands::cache::run(args, &ctx),
        Commands::Nonce(args) => commands::nonce::run(args, &ctx),
        Commands::Config(args) => commands::config::run(args, &ctx),
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
