//! Cachet URL Monitor Binary

use cachet_monitor::token_provider::resolve_token;
use cachet_monitor::{CachetClient, Config, EndpointMonitor, Scheduler};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Monitors HTTP endpoints and reflects their health on a Cachet status
/// page.
#[derive(Parser)]
#[command(name = "cachet_monitor", version)]
struct Cli {
    /// Path to the YAML configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    initialize_tracing();

    info!("Starting Cachet URL Monitor v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config file [{}]: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };

    // Resolve the API credential once; everything downstream only sees
    // the resulting string.
    let token = match resolve_token(&config.cachet.token).await {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to resolve Cachet API token: {}", e);
            std::process::exit(1);
        }
    };

    let client = match CachetClient::new(&config.cachet.api_url, &token) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build Cachet client: {}", e);
            std::process::exit(1);
        }
    };

    if !client.test_connectivity().await {
        warn!("Cachet API connectivity test failed, but continuing anyway");
    }

    let probe_client = match reqwest::Client::builder()
        .user_agent(format!("cachet_monitor/{}", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(probe_client) => probe_client,
        Err(e) => {
            error!("Failed to build probe client: {}", e);
            std::process::exit(1);
        }
    };

    let mut monitors = Vec::new();
    for endpoint in &config.endpoints {
        match EndpointMonitor::new(endpoint, &config, Arc::clone(&client), probe_client.clone())
            .await
        {
            Ok(monitor) => {
                info!("Monitoring URL: {} {}", endpoint.method, endpoint.url);
                monitors.push(monitor);
            }
            Err(e) => {
                error!("Skipping endpoint [{}]: {}", endpoint.name, e);
            }
        }
    }

    if monitors.is_empty() {
        error!("No endpoints could be started");
        std::process::exit(1);
    }

    info!("Starting monitor agent with {} endpoint(s)", monitors.len());

    if let Err(e) = Scheduler::new(monitors).start().await {
        error!("Monitor agent failed: {}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
