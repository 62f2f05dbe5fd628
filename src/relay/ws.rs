use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::api::SharedState;
use crate::feed::models::AggregatedSnapshot;
use crate::feed::scheduler::{FeedPhase, FeedState};
use crate::filter::CacheKey;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedMessage {
    /// A committed snapshot is visible (possibly stale while a new key loads)
    Snapshot {
        key: Option<CacheKey>,
        stale: bool,
        is_fetching: bool,
        last_success_at: Option<DateTime<Utc>>,
        snapshot: Arc<AggregatedSnapshot>,
    },
    /// The latest cycle failed
    Error {
        key: Option<CacheKey>,
        message: String,
        consecutive_failures: u32,
        has_snapshot: bool,
    },
    /// First fetch for a key is in flight and nothing is visible yet
    Loading { key: Option<CacheKey> },
    /// No vendor selected
    Idle,
}

impl FeedMessage {
    pub fn from_state(state: &FeedState) -> Self {
        match (state.phase, &state.snapshot) {
            (FeedPhase::Idle, _) => FeedMessage::Idle,
            (FeedPhase::Error, _) => FeedMessage::Error {
                key: state.key.clone(),
                message: state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
                consecutive_failures: state.consecutive_failures,
                has_snapshot: state.snapshot.is_some(),
            },
            (_, Some(snapshot)) => FeedMessage::Snapshot {
                key: state.key.clone(),
                stale: state.is_stale(),
                is_fetching: state.is_fetching,
                last_success_at: state.last_success_at,
                snapshot: snapshot.clone(),
            },
            (_, None) => FeedMessage::Loading {
                key: state.key.clone(),
            },
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    // Subscribe before reading the current state so no change is missed.
    let rx = state.ws_tx.subscribe();
    let greeting = encode(&FeedMessage::from_state(&state.feed.borrow()));

    let (mut sender, receiver) = socket.split();
    if let Some(text) = greeting
        && sender.send(Message::Text(text.into())).await.is_err()
    {
        return;
    }
    run_socket_loop(sender, receiver, rx).await;
}

/// Forward broadcast messages to one client, with ping/pong health checks.
/// If no Pong arrives within [`PONG_TIMEOUT`] after a Ping, the connection
/// is dropped.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("websocket client missed pong, closing");
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "websocket client lagging");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

fn encode(msg: &FeedMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize feed message");
            None
        }
    }
}

/// Serialize and broadcast a message to all connected WebSocket clients.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &FeedMessage) {
    if let Some(json) = encode(msg) {
        // No receivers is fine
        let _ = tx.send(json);
    }
}

/// Publish every FeedState change to the broadcast channel until the
/// scheduler goes away.
pub fn spawn_forwarder(
    mut feed: watch::Receiver<FeedState>,
    tx: broadcast::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while feed.changed().await.is_ok() {
            let msg = FeedMessage::from_state(&feed.borrow_and_update());
            broadcast_message(&tx, &msg);
        }
    })
}
