//! One-shot fetch: `floorwatch snapshot`.

use anyhow::{Context, Result};

use floorwatch::config::Config;
use floorwatch::feed::fetch_snapshot;
use floorwatch::filter::CacheKey;

pub async fn cmd_snapshot(config: &Config, pretty: bool) -> Result<()> {
    let vendor = config
        .vendor()
        .context("No vendor configured. Pass --vendor or set FLOORWATCH_VENDOR_ID")?;
    let filters = config.filter_set().context("Invalid filter")?;
    let key = CacheKey::new(Some(&vendor), &filters).context("No vendor configured")?;
    let client = config.client()?;

    let snapshot = fetch_snapshot(&client, &key, config.poll_config().cycle_timeout)
        .await
        .with_context(|| format!("Failed to fetch snapshot for {}", key))?;

    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)
    } else {
        serde_json::to_string(&snapshot)
    }
    .context("Failed to serialize snapshot")?;
    println!("{}", json);
    Ok(())
}
