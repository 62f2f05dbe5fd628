//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `watch`    | `Watch`          |
//! | `snapshot` | `Snapshot`       |
//! | `serve`    | `Serve`          |
//! | `config`   | `Config`         |

pub mod config;
pub mod serve;
pub mod snapshot;
pub mod watch;

pub use config::cmd_config;
pub use serve::cmd_serve;
pub use snapshot::cmd_snapshot;
pub use watch::cmd_watch;

use floorwatch::config::FloorwatchToml;

use super::FeedArgs;

/// Layer CLI flags over the file/env configuration.
pub fn apply_feed_args(toml: &mut FloorwatchToml, args: &FeedArgs) {
    if let Some(vendor) = &args.vendor {
        toml.feed.vendor_id = Some(vendor.clone());
    }
    if let Some(ms) = args.interval_ms {
        toml.feed.interval_ms = ms;
    }
    let filters = &mut toml.filters;
    for (slot, value) in [
        (&mut filters.project, &args.project),
        (&mut filters.machine, &args.machine),
        (&mut filters.operator, &args.operator),
        (&mut filters.status, &args.status),
        (&mut filters.date_range, &args.date_range),
    ] {
        if let Some(value) = value {
            *slot = value.clone();
        }
    }
}
