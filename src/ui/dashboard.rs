//! Terminal dashboard for the production feed.
//!
//! Renders every published [`FeedState`]. Output modes:
//! - `full`: clear the screen and redraw all panels
//! - `minimal`: one summary line per commit or failure
//! - `json`: one JSON line per commit or failure

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use crate::feed::scheduler::{FeedPhase, FeedState};
use crate::ui::icons::{CHECK, CROSS, PAUSED};
use crate::ui::panels;

/// Output mode for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Full-screen redraw of every panel
    #[default]
    Full,
    /// Single-line status updates
    Minimal,
    /// JSON lines for machine consumption
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "minimal" => Ok(Self::Minimal),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown ui mode '{}' (expected full, minimal or json)",
                other
            )),
        }
    }
}

impl std::fmt::Display for UiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UiMode::Full => "full",
            UiMode::Minimal => "minimal",
            UiMode::Json => "json",
        };
        f.write_str(s)
    }
}

/// What a line-oriented mode has already reported.
#[derive(Debug, Default, Clone, PartialEq)]
struct Reported {
    commits: u64,
    phase: FeedPhase,
    error: Option<String>,
}

impl Reported {
    fn of(state: &FeedState) -> Self {
        Self {
            commits: state.commits,
            phase: state.phase,
            error: state.last_error.clone(),
        }
    }
}

/// JSON line emitted in `json` mode.
#[derive(Debug, Serialize)]
struct JsonLine<'a> {
    event: &'static str,
    #[serde(flatten)]
    state: &'a FeedState,
}

/// Dashboard renderer bound to stdout.
pub struct DashboardUI {
    mode: UiMode,
    term: Term,
    /// Live only while the first load for a key is on screen
    spinner: Mutex<Option<ProgressBar>>,
    item_limit: usize,
    reported: Mutex<Option<Reported>>,
}

impl DashboardUI {
    pub fn new(mode: UiMode, item_limit: usize) -> Self {
        Self {
            mode,
            term: Term::stdout(),
            spinner: Mutex::new(None),
            item_limit,
            reported: Mutex::new(None),
        }
    }

    /// Render one published state.
    pub fn handle_state(&self, state: &FeedState) {
        match self.mode {
            UiMode::Full => self.render_full(state),
            UiMode::Minimal => {
                if self.should_report(state) {
                    let _ = writeln!(&self.term, "{}", summary_line(state));
                }
            }
            UiMode::Json => {
                if self.should_report(state)
                    && let Some(line) = json_line(state)
                {
                    let _ = writeln!(&self.term, "{}", line);
                }
            }
        }
    }

    /// Stop the spinner and leave the last frame on screen.
    pub fn finish(&self) {
        self.stop_spinner();
    }

    fn render_full(&self, state: &FeedState) {
        if state.phase == FeedPhase::Loading && state.snapshot.is_none() {
            let key = state
                .key
                .as_ref()
                .map(|k| k.to_string())
                .unwrap_or_default();
            let mut spinner = self.lock_spinner();
            let spinner = spinner.get_or_insert_with(|| {
                // The previous key's frame must not linger behind the spinner.
                let _ = self.term.clear_screen();
                loading_spinner()
            });
            spinner.set_message(format!("Fetching {}", key));
            return;
        }

        self.stop_spinner();
        let (_, width) = self.term.size();
        let _ = self.term.clear_screen();
        let _ = write!(
            &self.term,
            "{}",
            panels::render_dashboard(state, width as usize, self.item_limit)
        );
    }

    fn lock_spinner(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stop_spinner(&self) {
        if let Some(spinner) = self.lock_spinner().take() {
            spinner.finish_and_clear();
        }
    }

    /// Line modes only report transitions, not every in-flight toggle.
    fn should_report(&self, state: &FeedState) -> bool {
        if state.phase == FeedPhase::Loading {
            return false;
        }
        let current = Reported::of(state);
        let mut last = self
            .reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.as_ref() == Some(&current) {
            return false;
        }
        *last = Some(current);
        true
    }
}

fn loading_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn event_name(state: &FeedState) -> &'static str {
    match state.phase {
        FeedPhase::Idle => "idle",
        FeedPhase::Loading => "loading",
        FeedPhase::Ready => "snapshot",
        FeedPhase::Error => "error",
    }
}

/// One-line summary used by `minimal` mode.
pub fn summary_line(state: &FeedState) -> String {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    match state.phase {
        FeedPhase::Idle | FeedPhase::Loading => {
            format!("{} {}{}", style(stamp).dim(), PAUSED, "waiting for a vendor")
        }
        FeedPhase::Ready => {
            let Some(snap) = state.snapshot.as_deref() else {
                return format!("{} {}ready", style(stamp).dim(), CHECK);
            };
            let worst = snap.bottlenecks.iter().map(|b| b.severity).max();
            format!(
                "{} {}{} items={} in_progress={} completed={} machines={} bottleneck={}",
                style(stamp).dim(),
                CHECK,
                style(snap.key.to_string()).cyan(),
                snap.kpis.total_items,
                snap.kpis.in_progress,
                snap.kpis.completed_today,
                snap.machines.len(),
                worst
                    .map(|s| panels::ColorTier::from(s).paint(s.to_string()).to_string())
                    .unwrap_or_else(|| "none".to_string()),
            )
        }
        FeedPhase::Error => format!(
            "{} {}{} (failures: {})",
            style(stamp).dim(),
            CROSS,
            style(state.last_error.as_deref().unwrap_or("unknown error")).red(),
            state.consecutive_failures
        ),
    }
}

fn json_line(state: &FeedState) -> Option<String> {
    serde_json::to_string(&JsonLine {
        event: event_name(state),
        state,
    })
    .ok()
}
