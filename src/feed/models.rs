//! Wire schemas for the track-trace endpoints and the aggregated snapshot.
//!
//! Every endpoint answers `{ "data": <slice> }`. Slices are decoded into the
//! strict types below; required fields missing from the payload fail the
//! cycle instead of leaking placeholders into rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::filter::CacheKey;

/// Response envelope shared by all track-trace endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Backend identifier. The backend mixes numeric and string ids; both
/// normalize to a string. Integral floats such as `7.0` normalize to `7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(serde_json::Number),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => numeric_id(&n)
                .map(Id)
                .ok_or_else(|| serde::de::Error::custom(format!("id {} is not an integer", n))),
            Raw::Str(s) if !s.trim().is_empty() => Ok(Id(s)),
            Raw::Str(_) => Err(serde::de::Error::custom("id must not be empty")),
        }
    }
}

fn numeric_id(n: &serde_json::Number) -> Option<String> {
    if let Some(v) = n.as_u64() {
        return Some(v.to_string());
    }
    if let Some(v) = n.as_i64() {
        return Some(v.to_string());
    }
    let f = n.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then(|| format!("{}", f as i64))
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id(value.to_string())
    }
}

/// `{ id, name }` reference embedded in other records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: Id,
    #[serde(default)]
    pub name: String,
}

impl NamedRef {
    /// Display label, falling back to `#id` when the backend sent no name.
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            format!("#{}", self.id)
        } else {
            self.name.clone()
        }
    }
}

/// Headline counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_items: u64,
    pub in_progress: u64,
    pub completed_today: u64,
    pub active_machines: u64,
    pub active_operators: u64,
    #[serde(default)]
    pub avg_cycle_minutes: Option<f64>,
}

/// One scanned production unit and where it currently is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    #[serde(default)]
    pub project: Option<NamedRef>,
    #[serde(default)]
    pub lead: Option<NamedRef>,
    #[serde(default)]
    pub cut_list: Option<NamedRef>,
    #[serde(default)]
    pub machine: Option<NamedRef>,
    #[serde(default)]
    pub operator: Option<NamedRef>,
    #[serde(default)]
    pub actual_in_at: Option<DateTime<Utc>>,
}

/// Reported machine state. Unrecognized values decode as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineState {
    Running,
    Idle,
    Maintenance,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MachineState::Running => "running",
            MachineState::Idle => "idle",
            MachineState::Maintenance => "maintenance",
            MachineState::Offline => "offline",
            MachineState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub status: MachineState,
    #[serde(default)]
    pub current_item: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub hour: u8,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationPoint {
    pub machine: String,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorStat {
    pub id: Id,
    pub name: String,
    pub items_completed: u64,
    #[serde(default)]
    pub avg_cycle_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub id: Id,
    pub name: String,
    pub total_items: u64,
    pub completed_items: u64,
}

impl ProjectProgress {
    /// Completion percentage, derived from the counters.
    pub fn percent(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.completed_items as f64 * 100.0 / self.total_items as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub stage: String,
    pub waiting_items: u64,
    pub avg_wait_minutes: f64,
    pub severity: Severity,
}

/// The eight slices of one poll cycle, committed together or not at all.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedSnapshot {
    pub key: CacheKey,
    pub fetched_at: DateTime<Utc>,
    pub kpis: Kpis,
    pub items: Vec<Item>,
    pub machines: Vec<MachineStatus>,
    pub hourly_production: Vec<HourlyPoint>,
    pub machine_utilization: Vec<UtilizationPoint>,
    pub operators: Vec<OperatorStat>,
    pub projects: Vec<ProjectProgress>,
    pub bottlenecks: Vec<Bottleneck>,
}

/// Structural equality over the data; `fetched_at` is ignored.
impl PartialEq for AggregatedSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.kpis == other.kpis
            && self.items == other.items
            && self.machines == other.machines
            && self.hourly_production == other.hourly_production
            && self.machine_utilization == other.machine_utilization
            && self.operators == other.operators
            && self.projects == other.projects
            && self.bottlenecks == other.bottlenecks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_numbers_and_strings() {
        let a: Id = serde_json::from_str("17").unwrap();
        let b: Id = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Id>("\"\"").is_err());
        assert!(serde_json::from_str::<Id>("null").is_err());
    }

    #[test]
    fn test_id_accepts_unsigned_and_integral_float_numbers() {
        let big: Id = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(big, Id::from("18446744073709551615"));

        let float: Id = serde_json::from_str("7.0").unwrap();
        assert_eq!(float, Id::from("7"));

        let negative: Id = serde_json::from_str("-3").unwrap();
        assert_eq!(negative, Id::from("-3"));

        assert!(serde_json::from_str::<Id>("7.5").is_err());
    }

    #[test]
    fn test_item_with_sparse_references_decodes() {
        let json = r#"{
            "id": 9,
            "project": {"id": 7, "name": "Villa Kitchen"},
            "machine": {"id": "cnc-1"},
            "actual_in_at": "2026-10-16T08:30:00Z"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, Id::from("9"));
        assert_eq!(item.project.as_ref().unwrap().label(), "Villa Kitchen");
        assert_eq!(item.machine.as_ref().unwrap().label(), "#cnc-1");
        assert!(item.operator.is_none());
        assert!(item.actual_in_at.is_some());
    }

    #[test]
    fn test_item_without_id_is_rejected() {
        let result = serde_json::from_str::<Item>(r#"{"project": null}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_machine_state_maps_to_unknown() {
        let m: MachineStatus =
            serde_json::from_str(r#"{"id":1,"name":"Edgebander","status":"warming_up"}"#).unwrap();
        assert_eq!(m.status, MachineState::Unknown);

        let m: MachineStatus =
            serde_json::from_str(r#"{"id":2,"name":"Saw","status":"running"}"#).unwrap();
        assert_eq!(m.status, MachineState::Running);
    }

    #[test]
    fn test_unknown_severity_is_rejected() {
        let result = serde_json::from_str::<Bottleneck>(
            r#"{"stage":"Edging","waiting_items":4,"avg_wait_minutes":12.5,"severity":"extreme"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_severity_orders_by_urgency() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_project_percent_is_derived() {
        let p = ProjectProgress {
            id: Id::from("1"),
            name: "Office fit-out".to_string(),
            total_items: 40,
            completed_items: 10,
        };
        assert_eq!(p.percent(), 25.0);

        let empty = ProjectProgress {
            total_items: 0,
            completed_items: 0,
            ..p
        };
        assert_eq!(empty.percent(), 0.0);
    }

    #[test]
    fn test_envelope_requires_data_field() {
        let ok: Envelope<Vec<HourlyPoint>> =
            serde_json::from_str(r#"{"data":[{"hour":8,"count":14}]}"#).unwrap();
        assert_eq!(ok.data.len(), 1);

        let missing = serde_json::from_str::<Envelope<Vec<HourlyPoint>>>(r#"{"rows":[]}"#);
        assert!(missing.is_err());
    }
}
