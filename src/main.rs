//! # Courier — scheduled WhatsApp message dispatch
//!
//! Serves the HTTP gateway and hosts the scheduler. The messaging
//! session itself is started on demand via `POST /api/v1/bot/start`.
//!
//! Usage:
//!   courier                        # Start with ~/.courier/config.toml
//!   courier --port 8080            # Override the gateway port
//!   courier --config ./dev.toml    # Explicit config file

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use courier_core::{ConfigStore, CourierConfig};
use courier_gateway::AppState;
use courier_scheduler::EngineContext;
use courier_transport::WhatsAppWebTransport;

#[derive(Parser)]
#[command(
    name = "courier",
    version,
    about = "📨 Courier — scheduled WhatsApp message dispatch"
)]
struct Cli {
    /// Path to the config file (default: ~/.courier/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Gateway port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "courier=debug,tower_http=debug"
    } else {
        "courier=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => CourierConfig::load_from(Path::new(path))?,
        None => CourierConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let store_path = shellexpand::tilde(&config.store_path).to_string();
    let store = ConfigStore::new(Path::new(&store_path));
    // The store must be reachable at startup; anything later is
    // absorbed by the loop.
    let doc = store.load()?;

    println!("📨 Courier v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "   🌐 Gateway:    http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   🗄️  Store:      {store_path}");
    println!("   🚗 WebDriver:  {}", config.transport.webdriver_url);
    println!(
        "   📋 {} recipient(s), {} template(s), {} schedule(s)",
        doc.recipients.len(),
        doc.templates.len(),
        doc.schedules.len()
    );
    println!();

    let transport = WhatsAppWebTransport::new(config.transport.clone());
    let ctx = Arc::new(EngineContext::new(store, Box::new(transport)));
    let state = Arc::new(AppState::new(config, ctx));

    courier_gateway::serve(state).await?;
    Ok(())
}
