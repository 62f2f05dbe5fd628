//! Live dashboard: `floorwatch watch`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;

use floorwatch::config::Config;
use floorwatch::feed::PollScheduler;
use floorwatch::filter::FilterState;
use floorwatch::ui::{DashboardUI, UiMode};

pub async fn cmd_watch(config: &Config, ui: UiMode, items: usize) -> Result<()> {
    let client = config.client()?;
    let filters = FilterState::with_initial(config.filter_set().context("Invalid filter")?);
    let vendor = config.vendor();
    if vendor.is_none() {
        eprintln!("No vendor configured; the feed stays idle. Pass --vendor or set FLOORWATCH_VENDOR_ID.");
    }
    let (_vendor_tx, vendor_rx) = watch::channel(vendor);

    let scheduler = PollScheduler::spawn(
        Arc::new(client),
        filters.subscribe(),
        vendor_rx,
        config.poll_config(),
    );
    let dashboard = DashboardUI::new(ui, items);
    let mut state_rx = scheduler.subscribe();
    dashboard.handle_state(&state_rx.borrow_and_update().clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                dashboard.handle_state(&state);
            }
        }
    }

    dashboard.finish();
    scheduler.shutdown().await;
    Ok(())
}
