//! vestibule — minimal self-hosted login gateway.
//!
//! Renders login/registration forms, creates accounts with hashed
//! passwords, and tracks logged-in users through an in-memory session
//! store keyed by an opaque `uid` cookie.

mod config;
mod gateway;
mod session;
mod users;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "vestibule", version, about = "Minimal self-hosted login gateway")]
struct Cli {
    /// Path to a config.toml (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Directory for the account database (overrides config).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }

    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    gateway::run_gateway(&host, port, config).await
}
