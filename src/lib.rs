//! Live production-floor monitoring for a furniture ERP's Track & Trace
//! backend.
//!
//! | Module    | Responsibility                                        |
//! |-----------|-------------------------------------------------------|
//! | `filter`  | FilterSet, vendor scope and the shared filter holder  |
//! | `feed`    | HTTP client, aggregating fetch and the poll scheduler |
//! | `ui`      | Pure render panels and the terminal dashboard         |
//! | `relay`   | axum HTTP/WebSocket relay of the feed state           |
//! | `config`  | floorwatch.toml, env overrides                        |
//! | `logging` | tracing subscriber setup                              |
//! | `errors`  | Typed error enums                                     |

pub mod config;
pub mod errors;
pub mod feed;
pub mod filter;
pub mod logging;
pub mod relay;
pub mod ui;
