//! Itinerary gateway entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use itinerary_gateway::api::{create_router, AppState};
use itinerary_gateway::config::Config;
use itinerary_gateway::gateway::{Gateway, GatewaySettings};
use itinerary_gateway::interests::InterestCatalog;
use itinerary_gateway::metrics;
use itinerary_gateway::provider::{GeminiProvider, GenerativeProvider};
use itinerary_gateway::utils::shutdown_signal;

const ENDPOINTS: &[&str] = &[
    "GET  /health",
    "GET  /api/interests",
    "POST /api/generate-itinerary",
    "POST /api/generate-itinerary-stream",
    "POST /api/edit-itinerary",
    "GET  /metrics",
    "GET  /api-docs/openapi.json",
];

/// Travel itinerary gateway backed by Gemini.
#[derive(Parser, Debug)]
#[command(name = "itinerary-gateway")]
#[command(about = "HTTP gateway that turns travel requests into Gemini-generated itineraries")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Listen port, overriding API_PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Print the interest catalog.
    Interests,
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("itinerary_gateway=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.rust_log))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Logging settings come from the environment too, so load before init
    let loaded = Config::load();
    init_tracing(loaded.as_ref().unwrap_or(&Config::default()), args.verbose);

    let config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(&config),
        Some(Command::Interests) => cmd_interests(),
        Some(Command::Serve { port }) => cmd_serve(config, port).await,
        None => cmd_serve(config, None).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ITINERARY GATEWAY - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Building Gemini client... ");
    match GeminiProvider::new(config) {
        Ok(_) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Gemini client setup failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Model: {}", config.gemini_model);
    println!("  Base URL: {}", config.gemini_base_url);
    println!("  API Key: present");
    println!("  Upstream Timeout: {}s", config.upstream_timeout_secs);
    println!(
        "  Upstream Attempts: {} (delay {}ms)",
        config.upstream_max_attempts, config.upstream_retry_delay_ms
    );
    println!("  Temperature: {}", config.generation_temperature);
    println!("  Max Output Tokens: {}", config.max_output_tokens);
    println!("  Max Trip Days: {}", config.max_trip_days);
    println!("  Port: {}", config.api_port);
    println!("  Log Format: {}", config.log_format);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print the interest catalog.
fn cmd_interests() -> anyhow::Result<()> {
    let catalog = InterestCatalog::builtin();

    println!("======================================================================");
    println!("ITINERARY GATEWAY - INTEREST CATALOG");
    println!("======================================================================");
    for category in catalog.categories() {
        println!("{:<12} {}", category.id, category.label);
        println!("             {}", category.tags.join(", "));
    }
    println!("----------------------------------------------------------------------");
    println!("{} categories, {} tags", catalog.categories().len(), catalog.all_tags().len());

    Ok(())
}

/// Run the HTTP server.
async fn cmd_serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    // Missing credentials are fatal at startup
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    let metrics_handle = metrics::install_recorder()?;

    let provider = GeminiProvider::new(&config)?;
    info!(
        model = %provider.model(),
        timeout_secs = config.upstream_timeout_secs,
        max_attempts = config.upstream_max_attempts,
        "Gemini provider ready"
    );

    let gateway = Gateway::new(
        Arc::new(InterestCatalog::builtin()),
        Arc::new(provider),
        GatewaySettings::from_config(&config),
    );
    let app_state = AppState::new(gateway).with_metrics(metrics_handle);

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.api_port)));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    for endpoint in ENDPOINTS {
        info!("  {}", endpoint);
    }

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
