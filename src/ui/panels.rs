//! Presentation components for the production monitoring feed.
//!
//! Every panel is a pure function of one snapshot slice: it takes the slice
//! (or `None` before the first commit) and returns the rendered text. No
//! panel fetches data or keeps state. `None` renders a loading placeholder
//! and an empty slice renders a "no data" line.

use chrono::{DateTime, Utc};
use console::{Color, StyledObject, style};

use crate::feed::models::*;
use crate::feed::scheduler::{FeedPhase, FeedState};
use crate::ui::icons::{
    BOTTLENECK, CHART, CHECK, CLOCK, CROSS, DOT, ITEMS, KPI, MACHINE, OPERATOR, PAUSED, PROJECT,
    REFRESH,
};

const LOADING: &str = "  (loading...)";
const NO_DATA: &str = "  (no data)";
const BAR_CHAR: char = '█';

/// Colour tier shared by severity and machine-status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTier {
    Green,
    Yellow,
    Orange,
    Red,
    Gray,
}

impl ColorTier {
    pub fn paint<D>(self, value: D) -> StyledObject<D> {
        let styled = style(value);
        match self {
            ColorTier::Green => styled.green(),
            ColorTier::Yellow => styled.yellow(),
            ColorTier::Orange => styled.fg(Color::Color256(208)),
            ColorTier::Red => styled.red().bold(),
            ColorTier::Gray => styled.dim(),
        }
    }
}

impl From<Severity> for ColorTier {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => ColorTier::Green,
            Severity::Medium => ColorTier::Yellow,
            Severity::High => ColorTier::Orange,
            Severity::Critical => ColorTier::Red,
        }
    }
}

impl From<MachineState> for ColorTier {
    fn from(state: MachineState) -> Self {
        match state {
            MachineState::Running => ColorTier::Green,
            MachineState::Idle => ColorTier::Yellow,
            MachineState::Maintenance => ColorTier::Orange,
            MachineState::Offline => ColorTier::Red,
            MachineState::Unknown => ColorTier::Gray,
        }
    }
}

fn header(icon: &console::Emoji<'_, '_>, title: &str) -> String {
    format!("{}{}\n", icon, style(title).bold().underlined())
}

/// Pad or truncate to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        format!("{}{}", text, " ".repeat(width - count))
    } else if width > 1 {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    } else {
        text.chars().take(width).collect()
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    if width == 0 || max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * width as f64).round() as usize;
    BAR_CHAR.to_string().repeat(filled.clamp(1, width))
}

fn placeholder<T>(slice: Option<&[T]>) -> Option<&'static str> {
    match slice {
        None => Some(LOADING),
        Some([]) => Some(NO_DATA),
        Some(_) => None,
    }
}

fn minutes(value: Option<f64>) -> String {
    value
        .map(|m| format!("{:.1}m", m))
        .unwrap_or_else(|| "-".to_string())
}

/// Human-readable age of a timestamp relative to `now`.
pub fn relative_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h {}m ago", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn kpi_cards(kpis: Option<&Kpis>) -> String {
    let mut out = header(&KPI, "Floor KPIs");
    let Some(k) = kpis else {
        out.push_str(LOADING);
        out.push('\n');
        return out;
    };
    let cards = [
        ("Items", k.total_items.to_string()),
        ("In progress", k.in_progress.to_string()),
        ("Completed", k.completed_today.to_string()),
        ("Machines", k.active_machines.to_string()),
        ("Operators", k.active_operators.to_string()),
        ("Avg cycle", minutes(k.avg_cycle_minutes)),
    ];
    let line: Vec<String> = cards
        .iter()
        .map(|(label, value)| format!("{} {}", style(label).dim(), style(value).cyan().bold()))
        .collect();
    out.push_str("  ");
    out.push_str(&line.join("  │  "));
    out.push('\n');
    out
}

/// Most recent scans first, at most `limit` rows.
pub fn item_feed(items: Option<&[Item]>, limit: usize, now: DateTime<Utc>) -> String {
    let mut out = header(&ITEMS, "Live items");
    if let Some(p) = placeholder(items) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    let mut items: Vec<&Item> = items.unwrap_or_default().iter().collect();
    items.sort_by(|a, b| b.actual_in_at.cmp(&a.actual_in_at));

    let label = |r: &Option<NamedRef>| r.as_ref().map(NamedRef::label).unwrap_or_else(|| "-".to_string());
    for item in items.iter().take(limit) {
        let age = item
            .actual_in_at
            .map(|at| relative_age(at, now))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {} {} {} {} {} {}\n",
            style(fit(&item.id.to_string(), 10)).yellow(),
            fit(&label(&item.project), 18),
            fit(&label(&item.cut_list), 16),
            fit(&label(&item.machine), 14),
            fit(&label(&item.operator), 12),
            style(age).dim(),
        ));
    }
    if items.len() > limit {
        out.push_str(&format!(
            "  {}\n",
            style(format!("… {} more", items.len() - limit)).dim()
        ));
    }
    out
}

pub fn machine_status_list(machines: Option<&[MachineStatus]>) -> String {
    let mut out = header(&MACHINE, "Machines");
    if let Some(p) = placeholder(machines) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    for m in machines.unwrap_or_default() {
        let tier = ColorTier::from(m.status);
        let detail = match (&m.current_item, &m.operator) {
            (Some(item), Some(op)) => format!("{} · {}", item, op),
            (Some(item), None) => item.clone(),
            (None, Some(op)) => op.clone(),
            (None, None) => String::new(),
        };
        out.push_str(&format!(
            "  {}{} {} {}\n",
            tier.paint(DOT.to_string()),
            fit(&m.name, 18),
            tier.paint(fit(&m.status.to_string(), 12)),
            style(detail).dim(),
        ));
    }
    out
}

/// Horizontal bar per hour, scaled to the busiest hour.
pub fn hourly_production_chart(points: Option<&[HourlyPoint]>, width: usize) -> String {
    let mut out = header(&CHART, "Hourly production");
    if let Some(p) = placeholder(points) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    let mut points: Vec<&HourlyPoint> = points.unwrap_or_default().iter().collect();
    points.sort_by_key(|p| p.hour);
    let max = points.iter().map(|p| p.count).max().unwrap_or(0) as f64;
    for p in points {
        out.push_str(&format!(
            "  {:02}:00 {} {}\n",
            p.hour,
            style(fit(&bar(p.count as f64, max, width), width)).cyan(),
            p.count
        ));
    }
    out
}

/// Utilization bars on a fixed 0-100 scale.
pub fn machine_utilization_chart(points: Option<&[UtilizationPoint]>, width: usize) -> String {
    let mut out = header(&CHART, "Machine utilization");
    if let Some(p) = placeholder(points) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    for p in points.unwrap_or_default() {
        let tier = match p.utilization_percent {
            u if u >= 75.0 => ColorTier::Green,
            u if u >= 40.0 => ColorTier::Yellow,
            _ => ColorTier::Red,
        };
        out.push_str(&format!(
            "  {} {} {:>5.1}%\n",
            fit(&p.machine, 16),
            tier.paint(fit(&bar(p.utilization_percent, 100.0, width), width)),
            p.utilization_percent
        ));
    }
    out
}

pub fn top_operators_table(operators: Option<&[OperatorStat]>) -> String {
    let mut out = header(&OPERATOR, "Top operators");
    if let Some(p) = placeholder(operators) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    out.push_str(&format!(
        "  {}\n",
        style(format!("{:<4}{:<20}{:>8}{:>10}", "#", "Operator", "Items", "Avg")).dim()
    ));
    let mut ranked: Vec<&OperatorStat> = operators.unwrap_or_default().iter().collect();
    ranked.sort_by(|a, b| b.items_completed.cmp(&a.items_completed));
    for (rank, op) in ranked.iter().enumerate() {
        out.push_str(&format!(
            "  {:<4}{}{:>8}{:>10}\n",
            rank + 1,
            fit(&op.name, 20),
            op.items_completed,
            minutes(op.avg_cycle_minutes)
        ));
    }
    out
}

pub fn project_progress_table(projects: Option<&[ProjectProgress]>) -> String {
    let mut out = header(&PROJECT, "Project progress");
    if let Some(p) = placeholder(projects) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    for p in projects.unwrap_or_default() {
        let pct = p.percent();
        out.push_str(&format!(
            "  {} {} {:>4}/{:<4} {:>5.1}%\n",
            fit(&p.name, 22),
            style(fit(&bar(pct, 100.0, 20), 20)).green(),
            p.completed_items,
            p.total_items,
            pct
        ));
    }
    out
}

/// Bottlenecks, most severe first.
pub fn bottleneck_list(bottlenecks: Option<&[Bottleneck]>) -> String {
    let mut out = header(&BOTTLENECK, "Bottlenecks");
    if let Some(p) = placeholder(bottlenecks) {
        out.push_str(p);
        out.push('\n');
        return out;
    }
    let mut sorted: Vec<&Bottleneck> = bottlenecks.unwrap_or_default().iter().collect();
    sorted.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.waiting_items.cmp(&a.waiting_items))
    });
    for b in sorted {
        let tier = ColorTier::from(b.severity);
        out.push_str(&format!(
            "  {} {} {} waiting, avg {:.0}m\n",
            tier.paint(fit(&b.severity.to_string().to_uppercase(), 9)),
            fit(&b.stage, 20),
            b.waiting_items,
            b.avg_wait_minutes
        ));
    }
    out
}

/// One-line feed status: phase, staleness, last error, last success.
pub fn status_banner(state: &FeedState) -> String {
    let mut line = match state.phase {
        FeedPhase::Idle => format!("{}{}", PAUSED, style("No vendor selected").dim()),
        FeedPhase::Loading => format!("{}{}", REFRESH, style("Loading…").cyan()),
        FeedPhase::Ready => format!("{}{}", CHECK, style("Live").green().bold()),
        FeedPhase::Error => format!(
            "{}{} {}",
            CROSS,
            style("Refresh failed").red().bold(),
            style(state.last_error.as_deref().unwrap_or("unknown error")).red()
        ),
    };
    if let Some(key) = &state.key {
        line.push_str(&format!("  {}", style(key.to_string()).dim()));
    }
    if state.is_stale() {
        line.push_str(&format!("  {}", style("(showing previous filters)").yellow()));
    }
    if state.is_fetching && state.snapshot.is_some() {
        line.push_str(&format!("  {}", REFRESH));
    }
    if let Some(at) = state.last_success_at {
        line.push_str(&format!(
            "  {}{}",
            CLOCK,
            style(at.format("%H:%M:%S").to_string()).dim()
        ));
    }
    line
}

/// Compose every panel for the given state.
pub fn render_dashboard(state: &FeedState, width: usize, item_limit: usize) -> String {
    let snap = state.snapshot.as_deref();
    let now = snap.map(|s| s.fetched_at).unwrap_or_else(Utc::now);
    let chart_width = width.saturating_sub(30).clamp(10, 50);

    let sections = [
        status_banner(state),
        kpi_cards(snap.map(|s| &s.kpis)),
        item_feed(snap.map(|s| s.items.as_slice()), item_limit, now),
        machine_status_list(snap.map(|s| s.machines.as_slice())),
        hourly_production_chart(snap.map(|s| s.hourly_production.as_slice()), chart_width),
        machine_utilization_chart(snap.map(|s| s.machine_utilization.as_slice()), chart_width),
        top_operators_table(snap.map(|s| s.operators.as_slice())),
        project_progress_table(snap.map(|s| s.projects.as_slice())),
        bottleneck_list(snap.map(|s| s.bottlenecks.as_slice())),
    ];
    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CacheKey, FilterSet, VendorId};
    use chrono::{Duration, TimeZone};
    use console::strip_ansi_codes;
    use std::sync::Arc;

    fn plain(s: &str) -> String {
        strip_ansi_codes(s).to_string()
    }

    fn named(id: &str, name: &str) -> Option<NamedRef> {
        Some(NamedRef {
            id: Id::from(id),
            name: name.to_string(),
        })
    }

    fn snapshot() -> AggregatedSnapshot {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap();
        AggregatedSnapshot {
            key: CacheKey::new(VendorId::parse("42").as_ref(), &FilterSet::default()).unwrap(),
            fetched_at: now,
            kpis: Kpis {
                total_items: 120,
                in_progress: 14,
                completed_today: 33,
                active_machines: 5,
                active_operators: 9,
                avg_cycle_minutes: None,
            },
            items: vec![
                Item {
                    id: Id::from("A1"),
                    project: named("7", "Villa Kitchen"),
                    lead: None,
                    cut_list: None,
                    machine: named("m1", "Panel Saw"),
                    operator: None,
                    actual_in_at: Some(now - Duration::minutes(5)),
                },
                Item {
                    id: Id::from("A2"),
                    project: None,
                    lead: None,
                    cut_list: None,
                    machine: None,
                    operator: None,
                    actual_in_at: Some(now - Duration::seconds(30)),
                },
            ],
            machines: vec![MachineStatus {
                id: Id::from("m1"),
                name: "Panel Saw".to_string(),
                status: MachineState::Offline,
                current_item: None,
                operator: None,
            }],
            hourly_production: vec![
                HourlyPoint { hour: 9, count: 10 },
                HourlyPoint { hour: 8, count: 5 },
            ],
            machine_utilization: vec![],
            operators: vec![
                OperatorStat {
                    id: Id::from("o1"),
                    name: "Ravi".to_string(),
                    items_completed: 3,
                    avg_cycle_minutes: None,
                },
                OperatorStat {
                    id: Id::from("o2"),
                    name: "Meera".to_string(),
                    items_completed: 11,
                    avg_cycle_minutes: Some(9.5),
                },
            ],
            projects: vec![],
            bottlenecks: vec![
                Bottleneck {
                    stage: "Cutting".to_string(),
                    waiting_items: 2,
                    avg_wait_minutes: 5.0,
                    severity: Severity::Low,
                },
                Bottleneck {
                    stage: "Edge banding".to_string(),
                    waiting_items: 12,
                    avg_wait_minutes: 48.0,
                    severity: Severity::Critical,
                },
            ],
        }
    }

    #[test]
    fn test_severity_maps_to_color_tier() {
        assert_eq!(ColorTier::from(Severity::Low), ColorTier::Green);
        assert_eq!(ColorTier::from(Severity::Medium), ColorTier::Yellow);
        assert_eq!(ColorTier::from(Severity::High), ColorTier::Orange);
        assert_eq!(ColorTier::from(Severity::Critical), ColorTier::Red);
    }

    #[test]
    fn test_machine_state_maps_to_color_tier() {
        assert_eq!(ColorTier::from(MachineState::Running), ColorTier::Green);
        assert_eq!(ColorTier::from(MachineState::Idle), ColorTier::Yellow);
        assert_eq!(ColorTier::from(MachineState::Maintenance), ColorTier::Orange);
        assert_eq!(ColorTier::from(MachineState::Offline), ColorTier::Red);
        assert_eq!(ColorTier::from(MachineState::Unknown), ColorTier::Gray);
    }

    #[test]
    fn test_missing_slices_render_placeholders() {
        assert!(plain(&kpi_cards(None)).contains("loading"));
        assert!(plain(&item_feed(None, 10, Utc::now())).contains("loading"));
        assert!(plain(&machine_status_list(Some(&[]))).contains("no data"));
        assert!(plain(&hourly_production_chart(Some(&[]), 20)).contains("no data"));
        assert!(plain(&bottleneck_list(None)).contains("loading"));
    }

    #[test]
    fn test_item_feed_orders_newest_first_and_limits() {
        let snap = snapshot();
        let out = plain(&item_feed(Some(&snap.items), 1, snap.fetched_at));
        assert!(out.contains("A2"));
        assert!(out.contains("30s ago"));
        assert!(!out.contains("A1 "));
        assert!(out.contains("1 more"));
    }

    #[test]
    fn test_item_feed_uses_dash_for_missing_refs() {
        let snap = snapshot();
        let out = plain(&item_feed(Some(&snap.items), 10, snap.fetched_at));
        let a2 = out.lines().find(|l| l.contains("A2")).unwrap();
        assert!(a2.contains(" - "));
        let a1 = out.lines().find(|l| l.contains("A1")).unwrap();
        assert!(a1.contains("Villa Kitchen"));
        assert!(a1.contains("5m ago"));
    }

    #[test]
    fn test_bottlenecks_sorted_by_severity() {
        let snap = snapshot();
        let out = plain(&bottleneck_list(Some(&snap.bottlenecks)));
        let critical = out.find("CRITICAL").unwrap();
        let low = out.find("LOW").unwrap();
        assert!(critical < low);
    }

    #[test]
    fn test_operators_ranked_by_items_completed() {
        let snap = snapshot();
        let out = plain(&top_operators_table(Some(&snap.operators)));
        let meera = out.lines().find(|l| l.contains("Meera")).unwrap();
        assert!(meera.trim_start().starts_with('1'));
        assert!(meera.contains("9.5m"));
    }

    #[test]
    fn test_hourly_chart_sorted_by_hour_and_scaled() {
        let snap = snapshot();
        let out = plain(&hourly_production_chart(Some(&snap.hourly_production), 10));
        let eight = out.find("08:00").unwrap();
        let nine = out.find("09:00").unwrap();
        assert!(eight < nine);
        let nine_line = out.lines().find(|l| l.contains("09:00")).unwrap();
        assert_eq!(nine_line.matches(BAR_CHAR).count(), 10);
        let eight_line = out.lines().find(|l| l.contains("08:00")).unwrap();
        assert_eq!(eight_line.matches(BAR_CHAR).count(), 5);
    }

    #[test]
    fn test_charts_with_zero_width_render_without_bars() {
        let snap = snapshot();
        let hourly = plain(&hourly_production_chart(Some(&snap.hourly_production), 0));
        assert!(hourly.contains("08:00"));
        assert_eq!(hourly.matches(BAR_CHAR).count(), 0);

        let utilization = plain(&machine_utilization_chart(Some(&snap.machine_utilization), 0));
        assert!(utilization.contains('%'));
        assert_eq!(utilization.matches(BAR_CHAR).count(), 0);
    }

    #[test]
    fn test_project_table_shows_derived_percent() {
        let projects = vec![ProjectProgress {
            id: Id::from("7"),
            name: "Villa Kitchen".to_string(),
            total_items: 40,
            completed_items: 10,
        }];
        let out = plain(&project_progress_table(Some(&projects)));
        assert!(out.contains("25.0%"));
        assert!(out.contains("10/40"));
    }

    #[test]
    fn test_status_banner_reflects_phase() {
        let idle = FeedState::default();
        assert!(plain(&status_banner(&idle)).contains("No vendor"));

        let snap = Arc::new(snapshot());
        let errored = FeedState {
            phase: FeedPhase::Error,
            key: Some(snap.key.clone()),
            snapshot: Some(snap),
            last_error: Some("kpis returned HTTP 502".to_string()),
            ..Default::default()
        };
        let out = plain(&status_banner(&errored));
        assert!(out.contains("Refresh failed"));
        assert!(out.contains("HTTP 502"));
    }

    #[test]
    fn test_render_dashboard_without_snapshot_never_panics() {
        let out = plain(&render_dashboard(&FeedState::default(), 80, 10));
        assert!(out.contains("Floor KPIs"));
        assert!(out.contains("Bottlenecks"));
    }

    #[test]
    fn test_render_dashboard_with_snapshot_includes_all_panels() {
        let snap = Arc::new(snapshot());
        let state = FeedState {
            phase: FeedPhase::Ready,
            key: Some(snap.key.clone()),
            snapshot: Some(snap),
            ..Default::default()
        };
        let out = plain(&render_dashboard(&state, 100, 10));
        for title in [
            "Floor KPIs",
            "Live items",
            "Machines",
            "Hourly production",
            "Machine utilization",
            "Top operators",
            "Project progress",
            "Bottlenecks",
        ] {
            assert!(out.contains(title), "missing panel {}", title);
        }
        assert!(out.contains("120"));
    }

    #[test]
    fn test_fit_pads_and_truncates() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 4), "abc…");
        assert_eq!(fit("abc", 3), "abc");
    }

    #[test]
    fn test_relative_age_formats() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(relative_age(now - Duration::seconds(5), now), "5s ago");
        assert_eq!(relative_age(now - Duration::minutes(3), now), "3m ago");
        assert_eq!(relative_age(now - Duration::minutes(125), now), "2h 5m ago");
        assert_eq!(relative_age(now + Duration::seconds(5), now), "0s ago");
    }
}
