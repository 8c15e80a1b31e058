//! HTTP surface: admission, metrics and health routes.
//!
//! The handlers only ever call `WorkQueue::add` and read counters; all retry
//! state belongs to the scheduler.

mod admission;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::error;

use crate::error::MailboxError;
use crate::observability::Metrics;
use crate::queue::WorkQueue;

pub use admission::AdmissionResponse;

/// Shared handles for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<WorkQueue>,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/deadletter/:function", post(admission::admit))
        .route("/deadletter", post(admission::missing_function))
        .route("/deadletter/", post(admission::missing_function))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let counts = state.queue.counts_by_state().await;
    let depth = counts.pending + counts.delivered + counts.exhausted;
    Json(json!({ "status": "ok", "queue_depth": depth, "states": counts }))
}

/// Error → HTTP status mapping.
#[derive(Debug)]
pub struct ApiError(MailboxError);

impl From<MailboxError> for ApiError {
    fn from(err: MailboxError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MailboxError::MissingFunction
            | MailboxError::InvalidFunction(_)
            | MailboxError::InvalidHeader { .. } => StatusCode::BAD_REQUEST,
            MailboxError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MailboxError::Config(_) | MailboxError::Client(_) | MailboxError::Metrics(_) => {
                error!("internal error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::app::RetryScheduler;
    use crate::domain::RequestState;
    use crate::impls::GatewayRelay;
    use crate::ports::FixedClock;
    use crate::queue::RetryPolicy;

    fn state(capacity: usize) -> AppState {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        AppState {
            queue: Arc::new(WorkQueue::new(clock, capacity)),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    fn post(uri: &str) -> axum::http::request::Builder {
        Request::builder().method("POST").uri(uri)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn admission_with_defaults() {
        let state = state(10);
        let response = router(state.clone())
            .oneshot(post("/deadletter/echo").body(Body::from("hello")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert!(json["id"].as_str().unwrap().starts_with("req-"));

        let items = state.queue.snapshot().await;
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.definition.function(), "echo");
        assert_eq!(item.definition.body().as_ref(), b"hello");
        assert_eq!(item.definition.restart_delay(), Duration::from_secs(4));
        assert_eq!(item.definition.max_retries(), 0);
        assert_eq!(item.retries, 0);
        assert_eq!(item.state, RequestState::Pending);
    }

    #[tokio::test]
    async fn admission_reads_retry_headers_and_query() {
        let state = state(10);
        let response = router(state.clone())
            .oneshot(
                post("/deadletter/bin?trace=1")
                    .header("X-Delay-Duration", "10")
                    .header("X-Retries", "2")
                    .header("X-Max-Retries", "5")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let item = state.queue.snapshot().await.remove(0);
        assert_eq!(item.definition.restart_delay(), Duration::from_secs(10));
        assert_eq!(item.definition.max_retries(), 5);
        assert_eq!(item.retries, 2);
        assert_eq!(item.definition.query(), Some("trace=1"));
        assert!(
            item.definition
                .headers()
                .iter()
                .any(|(k, v)| k == "content-type" && v == "application/json")
        );
    }

    #[tokio::test]
    async fn missing_function_is_bad_request() {
        for uri in ["/deadletter", "/deadletter/", "/deadletter/%20"] {
            let state = state(10);
            let response = router(state.clone())
                .oneshot(post(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
            assert!(state.queue.is_empty().await);
        }
    }

    #[tokio::test]
    async fn dot_segment_function_is_bad_request() {
        for uri in ["/deadletter/..", "/deadletter/%2E%2E", "/deadletter/."] {
            let state = state(10);
            let response = router(state.clone())
                .oneshot(post(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
            assert!(state.queue.is_empty().await);
        }
    }

    #[tokio::test]
    async fn encoded_function_names_are_relayed_to_their_own_route() {
        let server = MockServer::start().await;
        for route in ["/async-function/a%2Fb/", "/async-function/echo%3Fx=1/"] {
            Mock::given(method("POST"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(202))
                .expect(1)
                .mount(&server)
                .await;
        }

        let state = state(10);
        let app = router(state.clone());
        for uri in ["/deadletter/a%2Fb", "/deadletter/echo%3Fx=1"] {
            let response = app
                .clone()
                .oneshot(post(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED, "uri {uri}");
        }

        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 4).unwrap(),
        ));
        let relay = GatewayRelay::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let scheduler = RetryScheduler::new(
            state.queue.clone(),
            Arc::new(relay),
            clock,
            state.metrics.clone(),
            RetryPolicy::default(),
            Duration::from_secs(1),
        );

        let report = scheduler.tick().await;
        assert_eq!(report.delivered, 2);
        assert!(state.queue.is_empty().await);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|r| r.url.query().is_none()));
    }

    #[tokio::test]
    async fn malformed_header_is_bad_request() {
        let state = state(10);
        let response = router(state.clone())
            .oneshot(
                post("/deadletter/echo")
                    .header("X-Delay-Duration", "soon")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("X-Delay-Duration"));
        assert!(state.queue.is_empty().await);
    }

    #[tokio::test]
    async fn full_queue_is_service_unavailable() {
        let state = state(1);
        let app = router(state.clone());

        let first = app
            .clone()
            .oneshot(post("/deadletter/a").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = app
            .oneshot(post("/deadletter/b").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(state.queue.len().await, 1);

        let text = state.metrics.render().unwrap();
        assert!(text.contains("mailbox_admissions_total 1"));
        assert!(text.contains("mailbox_admissions_rejected_total 1"));
    }

    #[tokio::test]
    async fn get_is_not_an_admission() {
        let state = state(10);
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/deadletter/echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(state.queue.is_empty().await);
    }

    #[tokio::test]
    async fn metrics_exposes_queue_depth() {
        let state = state(10);
        state.metrics.set_queue_depth(3);

        let response = router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("mailbox_queue_depth 3"));
    }

    #[tokio::test]
    async fn healthz_reports_live_depth() {
        let state = state(10);
        let app = router(state.clone());
        app.clone()
            .oneshot(post("/deadletter/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["queue_depth"], 1);
        assert_eq!(json["states"]["pending"], 1);
    }
}
