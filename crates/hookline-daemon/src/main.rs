//! hooklined - hookline host daemon
//!
//! Serves a fleet of simulated CAN devices on `POST /rpc`.
//!
//! Usage:
//!   hooklined [OPTIONS] [config.toml]
//!
//! If no config file is provided, a demo fleet is served.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use hookline_daemon::create_router;
use hookline_host::{HostConfig, ProviderManager};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Host config file (TOML)
    config_path: Option<String>,
    bind: IpAddr,
    /// Overrides the config file's port
    port: Option<u16>,
    log_level: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: None,
        bind: IpAddr::from([0, 0, 0, 0]),
        port: None,
        log_level: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                match args.get(i + 1).map(|v| v.parse::<IpAddr>()) {
                    Some(Ok(addr)) => result.bind = addr,
                    Some(Err(_)) => eprintln!("Invalid bind address: {}", args[i + 1]),
                    None => eprintln!("Missing argument for --bind"),
                }
                i += 2;
            }
            "--port" | "-p" => {
                match args.get(i + 1).map(|v| v.parse::<u16>()) {
                    Some(Ok(port)) => result.port = Some(port),
                    Some(Err(_)) => eprintln!("Invalid port: {}", args[i + 1]),
                    None => eprintln!("Missing argument for --port"),
                }
                i += 2;
            }
            "--log-level" | "-l" => {
                match args.get(i + 1) {
                    Some(level) => result.log_level = Some(level.clone()),
                    None => eprintln!("Missing argument for --log-level"),
                }
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"hooklined - hookline host daemon

Usage: hooklined [OPTIONS] [config.toml]

Options:
  -b, --bind <addr>         Address to listen on (default 0.0.0.0)
  -p, --port <port>         Port to listen on (default from config, else 7340)
  -l, --log-level <level>   Log filter when RUST_LOG is unset (default info)
  -h, --help                Print this help message

Examples:
  # Serve the demo fleet
  hooklined

  # Serve a configured fleet on localhost only
  hooklined --bind 127.0.0.1 fleet.toml
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let level = args.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("hooklined={level},hookline_daemon={level},hookline_host={level},tower_http=info").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting hooklined");

    let config = match &args.config_path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            HostConfig::from_file(Path::new(path)).with_context(|| format!("Failed to load {}", path))?
        }
        None => {
            tracing::info!("No config file provided, serving the demo fleet");
            HostConfig::demo()
        }
    };

    let manager = Arc::new(ProviderManager::from_config(&config));
    manager.auto_connect(&config).await?;
    for (address, info) in manager.providers() {
        tracing::info!(provider = %address, connected = info.connected, "{}", info.description);
    }

    let app = create_router(manager.clone());

    let addr = SocketAddr::new(args.bind, args.port.unwrap_or(config.server.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    manager.shutdown().await;
    Ok(())
}
