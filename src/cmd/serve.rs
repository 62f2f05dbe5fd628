//! Feed relay: `floorwatch serve`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;

use floorwatch::config::Config;
use floorwatch::feed::PollScheduler;
use floorwatch::filter::FilterState;
use floorwatch::relay::{RelayConfig, RelayState, shutdown_signal, start_relay};

pub async fn cmd_serve(config: &Config, port: Option<u16>, dev: bool) -> Result<()> {
    let client = config.client()?;
    let filters = FilterState::with_initial(config.filter_set().context("Invalid filter")?);
    let vendor = config.vendor();
    if vendor.is_none() {
        tracing::warn!("no vendor configured; the feed stays idle");
    }
    let (_vendor_tx, vendor_rx) = watch::channel(vendor);

    let scheduler = PollScheduler::spawn(
        Arc::new(client),
        filters.subscribe(),
        vendor_rx,
        config.poll_config(),
    );

    let relay = RelayConfig {
        port: port.unwrap_or(config.toml.relay.port),
        dev_mode: dev || config.toml.relay.dev,
    };
    let state = RelayState::new(filters, scheduler.subscribe());
    let served = start_relay(relay, state, shutdown_signal()).await;

    scheduler.shutdown().await;
    served
}
