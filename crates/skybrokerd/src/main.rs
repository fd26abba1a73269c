use anyhow::Context;
use clap::Parser;
use skybroker_cloud::{EmulatedCloud, PluginRegistry};
use skybroker_config::{BrokerConfig, CloudDriver, IntervalsConfig};
use skybroker_engine::{Broker, BrokerSetup, JsonFileStorage, ProcessorIntervals};
use skybroker_federation::LoopbackTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Federation broker daemon: accepts resource orders, reconciles them
/// against the configured cloud backends and federates with peer
/// providers.
#[derive(Parser)]
#[command(name = "skybrokerd", version, about)]
struct Cli {
    /// Path to the configuration file. Discovered if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn intervals(config: &IntervalsConfig) -> ProcessorIntervals {
    ProcessorIntervals {
        dispatch: Duration::from_millis(config.dispatch_ms),
        pending: Duration::from_millis(config.pending_ms),
        monitor: Duration::from_millis(config.monitor_ms),
        status_recheck: Duration::from_millis(config.status_recheck_ms),
        fulfilled: Duration::from_millis(config.fulfilled_ms),
        remote_sync: Duration::from_millis(config.remote_sync_ms),
        closed: Duration::from_millis(config.closed_ms),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BrokerConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BrokerConfig::load().context("discovering configuration")?,
    };
    tracing::info!(
        provider_id = %config.provider_id,
        clouds = config.clouds.len(),
        "starting skybrokerd"
    );

    let mut plugins = PluginRegistry::new();
    for cloud in &config.clouds {
        match cloud.driver {
            CloudDriver::Emulated => {
                Arc::new(EmulatedCloud::new()).register(&cloud.name, &mut plugins);
                tracing::info!(cloud = %cloud.name, "registered emulated cloud");
            }
        }
    }

    let transport = Arc::new(LoopbackTransport::new(config.provider_id.clone()));
    for peer in &config.peers {
        // The loopback transport has no wire; peers stay unreachable
        // until another broker in this process attaches itself.
        tracing::warn!(peer = %peer, "peer configured but no channel attached yet");
    }

    let storage = Arc::new(
        JsonFileStorage::open(&config.storage_dir)
            .await
            .with_context(|| {
                format!("opening order store in {}", config.storage_dir.display())
            })?,
    );

    let broker = Broker::build(BrokerSetup {
        local_provider_id: config.provider_id.clone(),
        plugins: Arc::new(plugins),
        transport,
        storage,
        intervals: intervals(&config.intervals),
    })
    .await
    .context("assembling broker")?;

    let handles = broker.spawn_processors();
    tracing::info!("broker running, press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    broker.shutdown();
    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "processor task panicked");
        }
    }
    tracing::info!("skybrokerd stopped");
    Ok(())
}
