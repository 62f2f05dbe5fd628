//! HTTP/WebSocket relay for the production feed.
//!
//! ```text
//! PollScheduler ──watch<FeedState>──> ws::spawn_forwarder ──broadcast──> /ws clients
//!       ▲
//!       └──watch<FilterSet>── FilterState <── PATCH /api/filters
//! ```

pub mod api;
pub mod server;
pub mod ws;

pub use api::{RelayState, SharedState};
pub use server::{RelayConfig, build_router, shutdown_signal, start_relay};
pub use ws::FeedMessage;
