//! Routes MQTT messages to HTTP requests and local commands.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;

use config::Config;
use error::Error;

use std::path::PathBuf;

use clap::Parser;
use mqtt_cmd_messaging::Bus;
use mqtt_cmd_messaging_mqtt::MqttBus;
use mqtt_cmd_router::{Registry, Router};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(env = "MQTT_CMD_CONFIG")]
    config: PathBuf,

    /// Log filter, overrides `log_level` from the configuration
    #[arg(long, env = "MQTT_CMD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Validate the configuration and exit without connecting
    #[arg(long)]
    check: bool,
}

fn init_tracing(level: Option<&str>) -> Result<(), Error> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.unwrap_or("info").to_lowercase())
            .map_err(|e| Error::Logging(e.to_string()))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn check(config: &Config) -> Result<(), Error> {
    let issues = Registry::validate(&config.router);
    if issues.is_empty() {
        println!("configuration is valid");
        return Ok(());
    }

    for issue in &issues {
        println!("{issue}");
    }
    Err(Error::InvalidConfig(issues.len()))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = sigint.recv() => info!("received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("failed to install signal handlers, falling back to ctrl-c: {e}");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("received interrupt signal");
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    init_tracing(args.log_level.as_deref().or(config.log_level.as_deref()))?;

    if args.check {
        return check(&config);
    }

    let shutdown_token = CancellationToken::new();
    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown_token.cancel();
    });

    let router = Router::new(config.router);
    let registry = router.registry();
    info!(
        filters = registry.subscriptions().len(),
        templates = registry.templates().len(),
        "routing table ready"
    );

    let options = config.mqtt.bus_options();
    info!(
        host = %options.host,
        port = options.port,
        client_id = %options.client_id,
        "connecting to broker"
    );
    let bus = MqttBus::connect(options, router).await?;

    shutdown_token.cancelled().await;

    info!("shutting down");
    if let Err(e) = bus.disconnect().await {
        warn!("failed to disconnect cleanly: {e}");
    }
    Ok(())
}
