// ABOUTME: Server binary: configuration, logging and bootstrap
// ABOUTME: Environment variables drive everything; the CLI can override the port
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

#![deny(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use latchkey::{config::ServerConfig, logging, server};
use tracing::info;

#[derive(Parser)]
#[command(name = "latchkey-server")]
#[command(about = "Latchkey - OAuth 2.0 / 2.1 authorization server")]
struct Args {
    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }

    logging::init(config.log_level, config.environment)?;
    info!(
        "starting latchkey authorization server v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );

    server::run(config).await
}
