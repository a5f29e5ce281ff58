//! doorbell-daemon: a doorbell that only rings for whoever is home
//!
//! `ring` notifies the registered owners whose devices are on the home
//! network, `who` lists them, and `watch` keeps polling the router and
//! announces arrivals and departures.
//!
//! Required settings (config file or environment):
//! - `ROUTER_IP`: router address
//! - `ROUTER_PASS`: router admin password

mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doorbell_core::{
    Config, HttpTransport, LogNotifier, PresenceQuery, RingOutcome, StaticRegistry, SystemClock,
};

/// Alternate config file location
const ENV_CONFIG_PATH: &str = "DOORBELL_CONFIG";

#[derive(Parser)]
#[command(name = "doorbell")]
#[command(version)]
#[command(about = "Doorbell that notifies whoever is home, based on the router's device table")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Notify every registered owner who is home that someone is at the door
    Ring,

    /// List registered owners who are home
    Who,

    /// Poll the router and announce arrivals and departures (default)
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "doorbell_daemon=info,doorbell_core=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let config = load_config()?;

    let transport = HttpTransport::new(config.router.request_timeout()).context("Failed to build HTTP client")?;
    let query = PresenceQuery::from_config(&config.router, Arc::new(transport), Arc::new(SystemClock));

    let registry = StaticRegistry::from_devices(&config.devices);
    if registry.is_empty() {
        tracing::warn!("No devices registered, nobody will ever be home");
    }

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Ring => match query.ring(&registry, &LogNotifier).await? {
            RingOutcome::NobodyHome => println!("Nobody registered is home"),
            RingOutcome::Notified(owners) => println!("Notified: {}", watch::join_names(&owners)),
        },
        Commands::Who => {
            let owners = query.online_owners(&registry).await?;
            if owners.is_empty() {
                println!("Nobody registered is home");
            } else {
                println!("Home: {}", watch::join_names(&owners));
            }
        }
        Commands::Watch => {
            tracing::info!(
                "Watching router at {} every {}s ({} registered devices)",
                config.router.host,
                config.daemon.poll_interval_secs,
                registry.len()
            );

            watch::run(&query, &registry, &LogNotifier, config.daemon.poll_interval()).await;
            tracing::info!("doorbell-daemon stopped");
        }
    }

    Ok(())
}

/// Load, override from the environment and validate once
fn load_config() -> anyhow::Result<Config> {
    let mut config = match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) => Config::load_from(Path::new(&path)).with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => Config::load().context("Failed to load config")?,
    };

    config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
