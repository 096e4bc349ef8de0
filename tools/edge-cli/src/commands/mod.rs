//! CLI command implementations.

pub mod cache;
pub mod config;
pub mod headers;
pub mod nonce;

use clap::{Args, Subcommand};

/// Arguments for the headers command.
#[derive(Args)]
pub struct HeadersArgs {
    /// Request path, optionally with a query string.
    pub path: String,

    /// Environment to evaluate for (development or production).
    #[arg(short, long)]
    pub env: Option<String>,

    /// Request ID to attach to the nonce.
    #[arg(long)]
    pub request_id: Option<String>,
}

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    /// Request path.
    pub path: String,
}

/// Arguments for the nonce command.
#[derive(Args)]
pub struct NonceArgs {
    /// Number of nonces to mint.
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Run load-time validation.
    Validate,
}
