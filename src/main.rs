// src/main.rs

//! The main entry point for the castctl interactive test client.

use anyhow::{Result, anyhow};
use castctl::config::Config;
use castctl::session::{SessionController, StdinCommandSource};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

/// Returns the value following `flag`, if the flag is present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|arg| arg == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|s| Some(s.as_str()))
            .ok_or_else(|| anyhow!("{flag} flag requires a value")),
        None => Ok(None),
    }
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("castctl version {VERSION}");
        return Ok(());
    }

    // Without `--config` the compiled-in defaults apply.
    let mut config = match flag_value(&args, "--config")? {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(host) = flag_value(&args, "--host")? {
        config.host = host.to_string();
    }
    if let Some(port_str) = flag_value(&args, "--port")? {
        match port_str.parse::<u16>() {
            Ok(port) => config.port = port,
            Err(_) => {
                eprintln!("Invalid port number: {port_str}");
                std::process::exit(1);
            }
        }
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e:#}");
        std::process::exit(1);
    }

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true),
        )
        .init();

    // Decided once per process; every session and reconnect reuses it.
    let encoding = config.resolve_encoding()?;
    info!(
        "castctl {} targeting {}:{} with text encoding '{}'",
        VERSION,
        config.host,
        config.port,
        encoding.name()
    );

    let mut input = StdinCommandSource::spawn();
    let mut controller = SessionController::new(config, encoding);

    match controller.run(&mut input).await {
        Ok(reason) => {
            info!("Session ended: {:?}", reason);
            Ok(())
        }
        Err(e) => {
            error!("Session runtime error: {}", e);
            Err(e.into())
        }
    }
}
