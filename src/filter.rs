//! Filter state for the production monitoring feed.
//!
//! A [`FilterSet`] is an immutable value; every user change produces a new one
//! through [`FilterState::set_filter`]. Together with the vendor it forms the
//! [`CacheKey`] the scheduler compares before committing a poll cycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

use crate::errors::FeedError;

/// A single filter dimension: either unconstrained or one backend id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selection {
    #[default]
    All,
    Id(String),
}

impl Selection {
    pub fn id(value: impl Into<String>) -> Self {
        Selection::Id(value.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            Selection::All => None,
            Selection::Id(id) => Some(id),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => write!(f, "all"),
            Selection::Id(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for Selection {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FeedError::InvalidFilter(
                "selection must be 'all' or a non-empty id".to_string(),
            ));
        }
        if trimmed.eq_ignore_ascii_case("all") {
            Ok(Selection::All)
        } else {
            Ok(Selection::Id(trimmed.to_string()))
        }
    }
}

impl TryFrom<String> for Selection {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selection> for String {
    fn from(value: Selection) -> Self {
        value.to_string()
    }
}

/// Reporting window for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[default]
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "yesterday")]
    Yesterday,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
}

impl DateRange {
    pub const ALL: [DateRange; 4] = [
        DateRange::Today,
        DateRange::Yesterday,
        DateRange::Last7Days,
        DateRange::Last30Days,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Yesterday => "yesterday",
            DateRange::Last7Days => "last_7_days",
            DateRange::Last30Days => "last_30_days",
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRange {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                FeedError::InvalidFilter(format!(
                    "invalid date range '{}'. Valid values: today, yesterday, last_7_days, last_30_days",
                    s
                ))
            })
    }
}

/// The full selection scoping one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub project: Selection,
    #[serde(default)]
    pub machine: Selection,
    #[serde(default)]
    pub operator: Selection,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub status: Selection,
}

impl FilterSet {
    /// Query-string parameters sent to every track-trace endpoint.
    ///
    /// Only constrained fields are included. `date_range` only scopes the
    /// cache key; the backend derives its window server-side.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        [
            ("project_id", &self.project),
            ("machine_id", &self.machine),
            ("operator_id", &self.operator),
            ("status", &self.status),
        ]
        .into_iter()
        .filter_map(|(name, sel)| sel.as_id().map(|id| (name, id.to_string())))
        .collect()
    }

    /// Return a new FilterSet with the patch applied.
    pub fn apply(&self, patch: &FilterPatch) -> FilterSet {
        FilterSet {
            project: patch.project.clone().unwrap_or_else(|| self.project.clone()),
            machine: patch.machine.clone().unwrap_or_else(|| self.machine.clone()),
            operator: patch.operator.clone().unwrap_or_else(|| self.operator.clone()),
            date_range: patch.date_range.unwrap_or(self.date_range),
            status: patch.status.clone().unwrap_or_else(|| self.status.clone()),
        }
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "project={};machine={};operator={};date_range={};status={}",
            self.project, self.machine, self.operator, self.date_range, self.status
        )
    }
}

/// Partial update for a [`FilterSet`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Selection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<Selection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Selection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Selection>,
}

impl FilterPatch {
    pub fn project(value: Selection) -> Self {
        Self {
            project: Some(value),
            ..Default::default()
        }
    }

    pub fn machine(value: Selection) -> Self {
        Self {
            machine: Some(value),
            ..Default::default()
        }
    }

    pub fn operator(value: Selection) -> Self {
        Self {
            operator: Some(value),
            ..Default::default()
        }
    }

    pub fn date_range(value: DateRange) -> Self {
        Self {
            date_range: Some(value),
            ..Default::default()
        }
    }

    pub fn status(value: Selection) -> Self {
        Self {
            status: Some(value),
            ..Default::default()
        }
    }
}

/// Tenant identifier. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(String);

impl VendorId {
    /// Parse a vendor id, treating blank input as "no vendor".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(VendorId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one fetch target: vendor plus filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub vendor: VendorId,
    pub filters: FilterSet,
}

impl CacheKey {
    /// Build a key; `None` when there is no vendor to fetch for.
    pub fn new(vendor: Option<&VendorId>, filters: &FilterSet) -> Option<Self> {
        vendor.map(|vendor| CacheKey {
            vendor: vendor.clone(),
            filters: filters.clone(),
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.vendor, self.filters)
    }
}

/// Holder for the active FilterSet.
///
/// Cloning shares the same underlying channel; every clone sees and
/// publishes the same value.
#[derive(Debug, Clone)]
pub struct FilterState {
    tx: watch::Sender<FilterSet>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::with_initial(FilterSet::default())
    }

    pub fn with_initial(initial: FilterSet) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> FilterSet {
        self.tx.borrow().clone()
    }

    /// Replace the fields present in `patch`, leaving the others as they are.
    ///
    /// Returns `true` when the FilterSet actually changed; subscribers are
    /// only notified in that case.
    pub fn set_filter(&self, patch: FilterPatch) -> bool {
        self.tx.send_if_modified(|current| {
            let next = current.apply(&patch);
            if next == *current {
                return false;
            }
            tracing::debug!(filters = %next, "filter changed");
            *current = next;
            true
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterSet> {
        self.tx.subscribe()
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}
