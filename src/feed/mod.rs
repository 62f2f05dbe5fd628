//! Production monitoring feed.
//!
//! ## Module Map
//!
//! ```text
//! FilterState ──watch──┐
//!                      ├──> scheduler.rs (PollScheduler, FeedState)
//! vendor ─────watch────┘          │
//!                                 │ every interval / on key change
//!                                 v
//!                      aggregator.rs (fetch_snapshot: try_join! of 8 reads)
//!                                 │
//!                                 v
//!                      client.rs (TrackTraceSource, HttpTrackTraceClient)
//! ```
//!
//! | Module       | Responsibility                                          |
//! |--------------|---------------------------------------------------------|
//! | `models`     | Wire schemas and `AggregatedSnapshot`                   |
//! | `client`     | `TrackTraceSource` trait + reqwest implementation       |
//! | `aggregator` | All-or-nothing fan-out/fan-in of one poll cycle         |
//! | `scheduler`  | Interval polling, stale-result suppression, `FeedState` |

pub mod aggregator;
pub mod client;
pub mod models;
pub mod scheduler;

pub use aggregator::fetch_snapshot;
pub use client::{Endpoint, FeedRequest, HttpTrackTraceClient, TrackTraceSource};
pub use models::AggregatedSnapshot;
pub use scheduler::{FeedPhase, FeedState, PollConfig, PollScheduler};
