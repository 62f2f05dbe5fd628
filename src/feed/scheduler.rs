//! Poll scheduler for the production monitoring feed.
//!
//! The scheduler owns the only writer of [`FeedState`]. It re-runs the
//! aggregating fetch every `interval` and immediately whenever the cache key
//! (vendor + filters) changes. Each cycle is tagged with the generation that
//! was current when it started; a result only commits if that generation is
//! still current, so a fetch for an old FilterSet can never overwrite the
//! snapshot for a newer one.
//!
//! ```text
//! Idle (no vendor) ──vendor──> Loading ──ok──> Ready <──ok── Error
//!                                 │              │  └──err──>  ▲
//!                                 └─────err──────┴─────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::errors::FeedError;
use crate::feed::aggregator::{DEFAULT_CYCLE_TIMEOUT, fetch_snapshot};
use crate::feed::client::TrackTraceSource;
use crate::feed::models::AggregatedSnapshot;
use crate::filter::{CacheKey, FilterSet, VendorId};

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Timing configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between scheduled cycles
    pub interval: Duration,
    /// Upper bound on one cycle (all eight reads)
    pub cycle_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }
}

/// Lifecycle phase of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPhase {
    /// No vendor; nothing is fetched
    #[default]
    Idle,
    /// First fetch for this vendor is in flight
    Loading,
    /// A snapshot is committed (may be refetching in the background)
    Ready,
    /// The latest cycle failed; the last committed snapshot stays visible
    Error,
}

/// Published state of the feed. Readers get cheap clones; the snapshot is
/// shared behind an `Arc`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedState {
    pub phase: FeedPhase,
    /// The cache key currently being polled
    pub key: Option<CacheKey>,
    /// Last committed snapshot, tagged with the key it was fetched for
    pub snapshot: Option<Arc<AggregatedSnapshot>>,
    pub is_fetching: bool,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Number of committed cycles since the scheduler started
    pub commits: u64,
}

impl FeedState {
    /// Whether the visible snapshot belongs to an older FilterSet than the
    /// one being polled (shown while the new key loads).
    pub fn is_stale(&self) -> bool {
        match (&self.snapshot, &self.key) {
            (Some(snapshot), Some(key)) => &snapshot.key != key,
            _ => false,
        }
    }
}

/// Handle to a running poll loop.
///
/// Dropping the handle stops polling and abandons any in-flight cycle.
pub struct PollScheduler {
    state_rx: watch::Receiver<FeedState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Start polling on the current tokio runtime.
    pub fn spawn(
        source: Arc<dyn TrackTraceSource>,
        filters: watch::Receiver<FilterSet>,
        vendor: watch::Receiver<Option<VendorId>>,
        config: PollConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(FeedState::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = PollWorker {
            source,
            filters,
            vendor,
            state: state_tx,
            config,
            active: None,
            active_vendor: None,
            generation: 0,
            next_seq: 0,
            last_committed_seq: 0,
            pending_current: 0,
            inflight: JoinSet::new(),
        };

        Self {
            state_rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(tokio::spawn(worker.run(shutdown_rx))),
        }
    }

    /// Current feed state.
    pub fn state(&self) -> FeedState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state_rx.clone()
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            tracing::warn!(error = %e, "poll loop panicked");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Result of one spawned cycle, tagged for the commit check.
struct CycleOutcome {
    generation: u64,
    seq: u64,
    key: CacheKey,
    result: Result<AggregatedSnapshot, FeedError>,
}

struct PollWorker {
    source: Arc<dyn TrackTraceSource>,
    filters: watch::Receiver<FilterSet>,
    vendor: watch::Receiver<Option<VendorId>>,
    state: watch::Sender<FeedState>,
    config: PollConfig,
    active: Option<CacheKey>,
    active_vendor: Option<VendorId>,
    /// Bumped on every cache-key change
    generation: u64,
    next_seq: u64,
    last_committed_seq: u64,
    /// In-flight cycles belonging to the current generation
    pending_current: usize,
    inflight: JoinSet<CycleOutcome>,
}

impl PollWorker {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial fetch is driven
        // by the key check below instead.
        ticker.tick().await;

        self.on_key_change();

        let mut filters_open = true;
        let mut vendor_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                changed = self.filters.changed(), if filters_open => {
                    if changed.is_err() {
                        filters_open = false;
                        continue;
                    }
                    if self.on_key_change() {
                        ticker.reset();
                    }
                }

                changed = self.vendor.changed(), if vendor_open => {
                    if changed.is_err() {
                        vendor_open = false;
                        continue;
                    }
                    if self.on_key_change() {
                        ticker.reset();
                    }
                }

                _ = ticker.tick() => self.on_tick(),

                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    match joined {
                        Ok(outcome) => self.on_complete(outcome),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => tracing::warn!(error = %e, "poll cycle task panicked"),
                    }
                }
            }
        }

        self.inflight.abort_all();
        tracing::debug!("poll loop stopped");
    }

    /// Recompute the cache key; returns `true` if it changed.
    fn on_key_change(&mut self) -> bool {
        let vendor = self.vendor.borrow_and_update().clone();
        let filters = self.filters.borrow_and_update().clone();
        let key = CacheKey::new(vendor.as_ref(), &filters);

        if key == self.active {
            return false;
        }

        self.generation += 1;
        self.pending_current = 0;
        self.active = key.clone();
        let vendor_changed = vendor != self.active_vendor;
        self.active_vendor = vendor;

        match key {
            None => {
                tracing::info!("no vendor selected; polling paused");
                self.inflight.abort_all();
                self.state.send_replace(FeedState::default());
            }
            Some(key) => {
                tracing::info!(key = %key, generation = self.generation, "cache key changed");
                self.state.send_modify(|s| {
                    s.key = Some(key.clone());
                    // Another tenant's data must never stay on screen.
                    if vendor_changed {
                        s.snapshot = None;
                        s.last_success_at = None;
                    }
                    if s.snapshot.is_none() {
                        s.phase = FeedPhase::Loading;
                        s.last_error = None;
                        s.consecutive_failures = 0;
                    }
                });
                self.start_cycle(key);
            }
        }
        true
    }

    fn on_tick(&mut self) {
        let Some(key) = self.active.clone() else {
            return;
        };
        if self.pending_current > 0 {
            tracing::debug!(key = %key, "previous cycle still in flight; skipping tick");
            return;
        }
        self.start_cycle(key);
    }

    fn start_cycle(&mut self, key: CacheKey) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let timeout = self.config.cycle_timeout;

        tracing::debug!(key = %key, seq, generation, "starting poll cycle");
        self.pending_current += 1;
        self.inflight.spawn(async move {
            let result = fetch_snapshot(source.as_ref(), &key, timeout).await;
            CycleOutcome {
                generation,
                seq,
                key,
                result,
            }
        });
        self.state.send_if_modified(|s| {
            let was_fetching = s.is_fetching;
            s.is_fetching = true;
            !was_fetching
        });
    }

    fn on_complete(&mut self, outcome: CycleOutcome) {
        let CycleOutcome {
            generation,
            seq,
            key,
            result,
        } = outcome;

        if generation != self.generation || self.active.as_ref() != Some(&key) {
            tracing::debug!(key = %key, seq, generation, "discarding superseded cycle");
            return;
        }
        self.pending_current = self.pending_current.saturating_sub(1);
        let still_fetching = self.pending_current > 0;

        if seq <= self.last_committed_seq {
            tracing::debug!(key = %key, seq, "discarding out-of-order cycle");
            return;
        }
        self.last_committed_seq = seq;

        match result {
            Ok(snapshot) => {
                tracing::debug!(
                    key = %key,
                    seq,
                    items = snapshot.items.len(),
                    "committing snapshot"
                );
                let fetched_at = snapshot.fetched_at;
                self.state.send_modify(|s| {
                    s.phase = FeedPhase::Ready;
                    s.snapshot = Some(Arc::new(snapshot));
                    s.is_fetching = still_fetching;
                    s.last_error = None;
                    s.consecutive_failures = 0;
                    s.last_success_at = Some(fetched_at);
                    s.commits += 1;
                });
            }
            Err(err) => {
                tracing::warn!(key = %key, seq, error = %err, "poll cycle failed; keeping last snapshot");
                self.state.send_modify(|s| {
                    s.phase = FeedPhase::Error;
                    s.is_fetching = still_fetching;
                    s.last_error = Some(err.to_string());
                    s.consecutive_failures += 1;
                });
            }
        }
    }
}
