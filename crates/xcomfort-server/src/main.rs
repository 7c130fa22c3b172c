//! xComfort Bridge power/energy service
//!
//! Usage: `xcomfort-bridge [config_dir] [telemetry_file]`
//!
//! Loads `configuration.yaml` from `config_dir` (default `./config`), sets
//! up the hub and feeds it telemetry from `telemetry_file` or stdin until
//! the input ends or Ctrl-C is pressed.

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use xcomfort_config::XComfortConfig;
use xcomfort_core::Context;
use xcomfort_event_bus::EventBus;
use xcomfort_hub::XComfortHub;
use xcomfort_state_store::StateStore;

use crate::telemetry::{LineSource, TelemetrySource};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let config_dir = PathBuf::from(args.next().unwrap_or_else(|| "config".to_string()));
    let telemetry_file = args.next();

    info!("Starting xComfort Bridge service");

    let config = XComfortConfig::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;

    let bus = Arc::new(EventBus::new());
    let states = Arc::new(StateStore::new(bus.clone()));
    let mut hub = XComfortHub::new(&config, &config_dir, bus.clone(), states.clone());
    hub.setup().await?;

    let source: Box<dyn TelemetrySource> = match telemetry_file {
        Some(path) => {
            let file = File::open(&path)
                .await
                .with_context(|| format!("opening telemetry file {}", path))?;
            Box::new(LineSource::new(BufReader::new(file)))
        }
        None => Box::new(LineSource::new(BufReader::new(tokio::io::stdin()))),
    };

    info!("xComfort Bridge {} is running", hub.identifier());

    tokio::select! {
        result = forward(source, &bus) => {
            result?;
            info!("Telemetry input ended");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl-C");
        }
    }

    info!("Shutting down...");
    hub.unload().await?;
    info!("{} sensors in final state", states.entity_count());

    Ok(())
}

async fn forward(mut source: Box<dyn TelemetrySource>, bus: &EventBus) -> Result<()> {
    let mut forwarded = 0usize;
    while let Some(telemetry) = source.next_message().await? {
        bus.publish_telemetry(telemetry, Context::new());
        forwarded += 1;
    }
    debug!("Forwarded {} telemetry messages", forwarded);
    Ok(())
}
