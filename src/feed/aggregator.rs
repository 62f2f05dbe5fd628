//! Fan-out/fan-in over the eight track-trace reads.
//!
//! All eight reads of a cycle run concurrently and are joined before
//! anything is returned. The first failure short-circuits the join and the
//! remaining reads are dropped; callers never see a partially filled
//! snapshot.

use chrono::Utc;
use std::time::Duration;

use crate::errors::FeedError;
use crate::feed::client::{Endpoint, FeedRequest, TrackTraceSource};
use crate::feed::models::*;
use crate::filter::CacheKey;

/// Default bound on a whole poll cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run one poll cycle for `key` and assemble the snapshot.
pub async fn fetch_snapshot<S>(
    source: &S,
    key: &CacheKey,
    cycle_timeout: Duration,
) -> Result<AggregatedSnapshot, FeedError>
where
    S: TrackTraceSource + ?Sized,
{
    let req = FeedRequest::new(key.clone());
    tracing::debug!(key = %key, cycle_id = %req.cycle_id, "fetching snapshot");

    let joined = async {
        tokio::try_join!(
            source.kpis(&req),
            source.items(&req),
            source.machines(&req),
            source.hourly_production(&req),
            source.machine_utilization(&req),
            source.top_operators(&req),
            source.project_progress(&req),
            source.bottlenecks(&req),
        )
    };

    let (kpis, items, machines, hourly_production, machine_utilization, operators, projects, bottlenecks) =
        tokio::time::timeout(cycle_timeout, joined)
            .await
            .map_err(|_| FeedError::Timeout {
                after_ms: cycle_timeout.as_millis() as u64,
            })??;

    validate_hourly(&hourly_production)?;
    validate_utilization(&machine_utilization)?;
    validate_projects(&projects)?;

    Ok(AggregatedSnapshot {
        key: key.clone(),
        fetched_at: Utc::now(),
        kpis,
        items,
        machines,
        hourly_production,
        machine_utilization,
        operators,
        projects,
        bottlenecks,
    })
}

fn invalid(endpoint: Endpoint, message: String) -> FeedError {
    FeedError::InvalidPayload {
        endpoint: endpoint.to_string(),
        message,
    }
}

fn validate_hourly(points: &[HourlyPoint]) -> Result<(), FeedError> {
    match points.iter().find(|p| p.hour > 23) {
        Some(p) => Err(invalid(
            Endpoint::HourlyProduction,
            format!("hour {} out of range 0-23", p.hour),
        )),
        None => Ok(()),
    }
}

fn validate_utilization(points: &[UtilizationPoint]) -> Result<(), FeedError> {
    match points
        .iter()
        .find(|p| !(0.0..=100.0).contains(&p.utilization_percent))
    {
        Some(p) => Err(invalid(
            Endpoint::MachineUtilization,
            format!(
                "utilization {} for '{}' out of range 0-100",
                p.utilization_percent, p.machine
            ),
        )),
        None => Ok(()),
    }
}

fn validate_projects(projects: &[ProjectProgress]) -> Result<(), FeedError> {
    match projects.iter().find(|p| p.completed_items > p.total_items) {
        Some(p) => Err(invalid(
            Endpoint::ProjectProgress,
            format!(
                "project {} reports {} of {} items completed",
                p.id, p.completed_items, p.total_items
            ),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory `TrackTraceSource` used by aggregator and scheduler tests.

    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed fixture data, with per-endpoint failure and delay knobs.
    ///
    /// The item count follows the `project` filter id when it parses as a
    /// number, so tests can tell which FilterSet a snapshot came from.
    #[derive(Default)]
    pub struct FixtureSource {
        pub calls: AtomicUsize,
        pub failing: Mutex<HashSet<Endpoint>>,
        pub delay: Mutex<Option<Duration>>,
        pub item_count: Mutex<usize>,
        pub seen_params: Mutex<Vec<Vec<(&'static str, String)>>>,
    }

    impl FixtureSource {
        pub fn with_items(count: usize) -> Self {
            let s = Self::default();
            *s.item_count.lock().unwrap() = count;
            s
        }

        pub fn fail(&self, endpoint: Endpoint) {
            self.failing.lock().unwrap().insert(endpoint);
        }

        pub fn recover(&self) {
            self.failing.lock().unwrap().clear();
        }

        pub fn set_delay(&self, delay: Option<Duration>) {
            *self.delay.lock().unwrap() = delay;
        }

        pub fn cycles(&self) -> usize {
            self.calls.load(Ordering::SeqCst) / Endpoint::ALL.len()
        }

        async fn enter(&self, endpoint: Endpoint, req: &FeedRequest) -> Result<(), FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_params
                .lock()
                .unwrap()
                .push(req.key.filters.query_params());
            let delay = *self.delay.lock().unwrap();
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            if self.failing.lock().unwrap().contains(&endpoint) {
                return Err(FeedError::Status {
                    endpoint: endpoint.to_string(),
                    status: 500,
                });
            }
            Ok(())
        }

        fn count_for(&self, req: &FeedRequest) -> usize {
            req.key
                .filters
                .project
                .as_id()
                .and_then(|id| id.parse().ok())
                .unwrap_or_else(|| *self.item_count.lock().unwrap())
        }
    }

    pub fn named(id: &str, name: &str) -> NamedRef {
        NamedRef {
            id: Id::from(id),
            name: name.to_string(),
        }
    }

    #[async_trait]
    impl TrackTraceSource for FixtureSource {
        async fn kpis(&self, req: &FeedRequest) -> Result<Kpis, FeedError> {
            self.enter(Endpoint::Kpis, req).await?;
            Ok(Kpis {
                total_items: self.count_for(req) as u64,
                in_progress: 3,
                completed_today: 12,
                active_machines: 4,
                active_operators: 6,
                avg_cycle_minutes: Some(18.5),
            })
        }

        async fn items(&self, req: &FeedRequest) -> Result<Vec<Item>, FeedError> {
            self.enter(Endpoint::Items, req).await?;
            Ok((0..self.count_for(req))
                .map(|i| Item {
                    id: Id(format!("item-{}", i)),
                    project: Some(named("7", "Villa Kitchen")),
                    lead: None,
                    cut_list: Some(named("cl-1", "Carcass panels")),
                    machine: Some(named("m1", "Panel Saw")),
                    operator: Some(named("o1", "Ravi")),
                    actual_in_at: None,
                })
                .collect())
        }

        async fn machines(&self, req: &FeedRequest) -> Result<Vec<MachineStatus>, FeedError> {
            self.enter(Endpoint::Machines, req).await?;
            Ok(vec![MachineStatus {
                id: Id::from("m1"),
                name: "Panel Saw".to_string(),
                status: MachineState::Running,
                current_item: Some("item-0".to_string()),
                operator: Some("Ravi".to_string()),
            }])
        }

        async fn hourly_production(&self, req: &FeedRequest) -> Result<Vec<HourlyPoint>, FeedError> {
            self.enter(Endpoint::HourlyProduction, req).await?;
            Ok(vec![
                HourlyPoint { hour: 8, count: 5 },
                HourlyPoint { hour: 9, count: 9 },
            ])
        }

        async fn machine_utilization(
            &self,
            req: &FeedRequest,
        ) -> Result<Vec<UtilizationPoint>, FeedError> {
            self.enter(Endpoint::MachineUtilization, req).await?;
            Ok(vec![UtilizationPoint {
                machine: "Panel Saw".to_string(),
                utilization_percent: 72.0,
            }])
        }

        async fn top_operators(&self, req: &FeedRequest) -> Result<Vec<OperatorStat>, FeedError> {
            self.enter(Endpoint::TopOperators, req).await?;
            Ok(vec![OperatorStat {
                id: Id::from("o1"),
                name: "Ravi".to_string(),
                items_completed: 14,
                avg_cycle_minutes: Some(11.0),
            }])
        }

        async fn project_progress(
            &self,
            req: &FeedRequest,
        ) -> Result<Vec<ProjectProgress>, FeedError> {
            self.enter(Endpoint::ProjectProgress, req).await?;
            Ok(vec![ProjectProgress {
                id: Id::from("7"),
                name: "Villa Kitchen".to_string(),
                total_items: 40,
                completed_items: 10,
            }])
        }

        async fn bottlenecks(&self, req: &FeedRequest) -> Result<Vec<Bottleneck>, FeedError> {
            self.enter(Endpoint::Bottlenecks, req).await?;
            Ok(vec![Bottleneck {
                stage: "Edge banding".to_string(),
                waiting_items: 9,
                avg_wait_minutes: 42.0,
                severity: Severity::High,
            }])
        }
    }
}
