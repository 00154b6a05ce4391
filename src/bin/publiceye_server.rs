//!
//! publiceye server binary
//! -----------------------
//! Command-line entry point for the publiceye HTTP API. Supports configuration
//! via CLI flags and environment variables (see `--help`).

use anyhow::Result;
use std::env;

use publiceye::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    println!(r"             __    ___                    
    ____  __  __/ /_  / (_)_______  __  _____ 
   / __ \/ / / / __ \/ / / ___/ _ \/ / / / _ \
  / /_/ / /_/ / /_/ / / / /__/  __/ /_/ /  __/
 / .___/\__,_/_.___/_/_/\___/\___/\__, /\___/ 
/_/                              /____/       ");

    // Initialize tracing subscriber; RUST_LOG overrides the default level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = ServerConfig::from_env_and_args(&args);
    println!(
        "publiceye starting: http={}:{}, data_root={}",
        config.host, config.http_port, config.data_root.display()
    );
    publiceye::server::run_with_config(config).await
}
