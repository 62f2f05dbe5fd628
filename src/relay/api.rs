use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::sync::{broadcast, watch};

use crate::feed::scheduler::FeedState;
use crate::filter::{FilterPatch, FilterSet, FilterState};

// ── Shared relay state ────────────────────────────────────────────────

pub struct RelayState {
    pub filters: FilterState,
    pub feed: watch::Receiver<FeedState>,
    pub ws_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<RelayState>;

impl RelayState {
    pub fn new(filters: FilterState, feed: watch::Receiver<FeedState>) -> Self {
        let (ws_tx, _rx) = broadcast::channel::<String>(256);
        Self {
            filters,
            feed,
            ws_tx,
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/feed", get(get_feed))
        .route("/api/filters", get(get_filters).patch(patch_filters))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn get_feed(State(state): State<SharedState>) -> Json<FeedState> {
    Json(state.feed.borrow().clone())
}

async fn get_filters(State(state): State<SharedState>) -> Json<FilterSet> {
    Json(state.filters.current())
}

/// Decoded by hand so invalid filter values answer 400 rather than 422.
async fn patch_filters(
    State(state): State<SharedState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<FilterSet>, ApiError> {
    let patch: FilterPatch = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid filter patch: {}", e)))?;

    if state.filters.set_filter(patch) {
        tracing::info!(filters = %state.filters.current(), "filters updated via relay");
    }
    Ok(Json(state.filters.current()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::scheduler::FeedPhase;
    use crate::filter::{DateRange, Selection};
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> (Router, SharedState, watch::Sender<FeedState>) {
        let (feed_tx, feed_rx) = watch::channel(FeedState::default());
        let state = Arc::new(RelayState::new(FilterState::new(), feed_rx));
        let app = api_router().with_state(state.clone());
        (app, state, feed_tx)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn patch_request(json: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri("/api/filters")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _, _) = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_get_feed_reflects_published_state() {
        let (app, _, feed_tx) = test_app();
        feed_tx.send_modify(|s| {
            s.phase = FeedPhase::Error;
            s.last_error = Some("kpis returned HTTP 500".to_string());
        });

        let request = Request::builder()
            .uri("/api/feed")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let feed: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(feed["phase"], "error");
        assert_eq!(feed["last_error"], "kpis returned HTTP 500");
        assert!(feed["snapshot"].is_null());
    }

    #[tokio::test]
    async fn test_get_filters_defaults() {
        let (app, _, _) = test_app();
        let request = Request::builder()
            .uri("/api/filters")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let filters: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(filters["project"], "all");
        assert_eq!(filters["date_range"], "today");
    }

    #[tokio::test]
    async fn test_patch_filters_updates_holder() {
        let (app, state, _) = test_app();
        let mut rx = state.filters.subscribe();

        let response = app
            .oneshot(patch_request(r#"{"project":"7","date_range":"last_7_days"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let filters: FilterSet = body_json(response.into_body()).await;
        assert_eq!(filters.project, Selection::id("7"));
        assert_eq!(filters.date_range, DateRange::Last7Days);
        assert!(filters.machine.is_all());

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().project, Selection::id("7"));
    }

    #[tokio::test]
    async fn test_patch_filters_invalid_date_range_is_400() {
        let (app, state, _) = test_app();
        let response = app
            .oneshot(patch_request(r#"{"date_range":"fortnight"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid filter patch"));
        assert_eq!(state.filters.current(), FilterSet::default());
    }

    #[tokio::test]
    async fn test_patch_filters_empty_id_is_400() {
        let (app, _, _) = test_app();
        let response = app
            .oneshot(patch_request(r#"{"machine":"  "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_patch_filters_unchanged_does_not_notify() {
        let (app, state, _) = test_app();
        let rx = state.filters.subscribe();

        let response = app
            .oneshot(patch_request(r#"{"project":"all"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!rx.has_changed().unwrap());
    }
}
