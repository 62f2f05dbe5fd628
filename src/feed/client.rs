use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{ConfigError, FeedError};
use crate::feed::models::*;
use crate::filter::CacheKey;

/// The eight read endpoints under `/track-trace/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Kpis,
    Items,
    Machines,
    HourlyProduction,
    MachineUtilization,
    TopOperators,
    ProjectProgress,
    Bottlenecks,
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Endpoint::Kpis,
        Endpoint::Items,
        Endpoint::Machines,
        Endpoint::HourlyProduction,
        Endpoint::MachineUtilization,
        Endpoint::TopOperators,
        Endpoint::ProjectProgress,
        Endpoint::Bottlenecks,
    ];

    /// Path segment after `/track-trace/`.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Kpis => "kpis",
            Endpoint::Items => "items",
            Endpoint::Machines => "machines",
            Endpoint::HourlyProduction => "hourly-production",
            Endpoint::MachineUtilization => "machine-utilization",
            Endpoint::TopOperators => "top-operators",
            Endpoint::ProjectProgress => "project-progress",
            Endpoint::Bottlenecks => "bottlenecks",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// One read within a poll cycle.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub key: CacheKey,
    /// Shared by all eight reads of the same cycle; sent as `X-Request-Id`.
    pub cycle_id: Uuid,
}

impl FeedRequest {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            cycle_id: Uuid::new_v4(),
        }
    }
}

/// Abstraction over the track-trace backend for testability.
/// Real implementation: `HttpTrackTraceClient`. Test doubles live next to the
/// aggregator and scheduler tests.
#[async_trait]
pub trait TrackTraceSource: Send + Sync {
    async fn kpis(&self, req: &FeedRequest) -> Result<Kpis, FeedError>;

    async fn items(&self, req: &FeedRequest) -> Result<Vec<Item>, FeedError>;

    async fn machines(&self, req: &FeedRequest) -> Result<Vec<MachineStatus>, FeedError>;

    async fn hourly_production(&self, req: &FeedRequest) -> Result<Vec<HourlyPoint>, FeedError>;

    async fn machine_utilization(
        &self,
        req: &FeedRequest,
    ) -> Result<Vec<UtilizationPoint>, FeedError>;

    async fn top_operators(&self, req: &FeedRequest) -> Result<Vec<OperatorStat>, FeedError>;

    async fn project_progress(&self, req: &FeedRequest) -> Result<Vec<ProjectProgress>, FeedError>;

    async fn bottlenecks(&self, req: &FeedRequest) -> Result<Vec<Bottleneck>, FeedError>;
}

/// reqwest-backed client for the track-trace REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpTrackTraceClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpTrackTraceClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("floorwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/track-trace/{endpoint}/{vendor}`, segments percent-encoded.
    pub fn url_for(&self, endpoint: Endpoint, key: &CacheKey) -> Url {
        let mut url = self.base_url.clone();
        // parse_base_url rejects cannot-be-a-base URLs, so segments are available.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["track-trace", endpoint.path(), key.vendor.as_str()]);
        }
        url
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        req: &FeedRequest,
    ) -> Result<T, FeedError> {
        let url = self.url_for(endpoint, &req.key);
        let mut builder = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("X-Request-Id", req.cycle_id.to_string())
            .query(&req.key.filters.query_params());
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await.map_err(|source| FeedError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|source| FeedError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;

        serde_json::from_slice::<Envelope<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|e| FeedError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl TrackTraceSource for HttpTrackTraceClient {
    async fn kpis(&self, req: &FeedRequest) -> Result<Kpis, FeedError> {
        self.get_data(Endpoint::Kpis, req).await
    }

    async fn items(&self, req: &FeedRequest) -> Result<Vec<Item>, FeedError> {
        self.get_data(Endpoint::Items, req).await
    }

    async fn machines(&self, req: &FeedRequest) -> Result<Vec<MachineStatus>, FeedError> {
        self.get_data(Endpoint::Machines, req).await
    }

    async fn hourly_production(&self, req: &FeedRequest) -> Result<Vec<HourlyPoint>, FeedError> {
        self.get_data(Endpoint::HourlyProduction, req).await
    }

    async fn machine_utilization(
        &self,
        req: &FeedRequest,
    ) -> Result<Vec<UtilizationPoint>, FeedError> {
        self.get_data(Endpoint::MachineUtilization, req).await
    }

    async fn top_operators(&self, req: &FeedRequest) -> Result<Vec<OperatorStat>, FeedError> {
        self.get_data(Endpoint::TopOperators, req).await
    }

    async fn project_progress(&self, req: &FeedRequest) -> Result<Vec<ProjectProgress>, FeedError> {
        self.get_data(Endpoint::ProjectProgress, req).await
    }

    async fn bottlenecks(&self, req: &FeedRequest) -> Result<Vec<Bottleneck>, FeedError> {
        self.get_data(Endpoint::Bottlenecks, req).await
    }
}

/// Validate the configured backend base URL.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            message: "expected an http(s) URL".to_string(),
        });
    }
    Ok(url)
}
