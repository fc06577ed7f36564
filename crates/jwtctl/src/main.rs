//! jwtctl
//!
//! Issue, verify and inspect tokens from the command line using the same
//! environment configuration as services embedding `jwt-manager`.

#![warn(clippy::pedantic)]

mod commands;

use clap::Parser;
use commands::{build_manager, execute, Cli};
use jwt_manager::ManagerConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jwtctl=info,jwt_manager=info".into());

    // stdout carries command output only
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ManagerConfig::from_env().map_err(|e| {
        error!(target: "jwtctl", "Failed to load configuration: {}", e);
        e
    })?;
    info!(target: "jwtctl", issuer = %config.issuer, algorithm = ?config.algorithm, "Configuration loaded");

    let manager = build_manager(config)?;
    let output = execute(&manager, cli.command).await?;
    println!("{output}");

    Ok(())
}
