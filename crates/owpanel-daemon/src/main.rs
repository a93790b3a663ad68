//! OWPanel Daemon - Main entry point
//!
//! Hosts the OWServer new-device registration panel and relays it to the
//! Vera hub.

mod api;
mod config;
mod hub;
mod pages;
mod panel;
mod server;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::hub::{Hub, HubClient};
use crate::panel::{PanelError, PanelSession};
use crate::state::PanelView;

#[derive(Parser, Debug)]
#[command(name = "owpanel")]
#[command(about = "OWServer new-device registration panel for Vera hubs")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "owpanel.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Load the panel once, print its HTML and exit
    #[arg(long)]
    once: bool,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

/// Load the panel a single time
///
/// Returns the panel HTML, which is the error message on failure, together
/// with the number of rows awaiting registration.
async fn load_once<H: Hub>(hub: &H) -> (String, Result<usize, PanelError>) {
    let view = PanelView::default();
    let (session, result) = PanelSession::open(hub, &view, 1).await;
    (view.html(), result.map(|()| session.devices().len()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("OWPanel v{}", env!("CARGO_PKG_VERSION"));

    if args.write_default_config {
        return config::save_default_config(&args.config);
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        hub = %config.hub.endpoint(),
        plugin = %config.hub.plugin_id,
        "Configuration loaded"
    );

    if args.once {
        // Single load mode
        let hub = HubClient::new(&config.hub)?;
        let (html, result) = load_once(&hub).await;
        println!("{}", html);
        let devices = result?;
        info!(devices, "Panel loaded");
    } else {
        let state = state::AppState::new(config)?;
        server::run(state).await?;
    }

    Ok(())
}
