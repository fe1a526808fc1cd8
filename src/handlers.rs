// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact relay.

use crate::client::ClientIdentity;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::Rejection;
use crate::mailer::Mailer;
use crate::metrics::{MetricsError, RelayMetrics};
use crate::pipeline::{InboundCall, PipelineResult, SubmissionPipeline};
use crate::status::StatusCounter;
use crate::submission::SubmissionRequest;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared application state.
pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub mailer: Arc<dyn Mailer>,
    pub status: Arc<StatusCounter>,
    pub metrics: RelayMetrics,
    pub config: Config,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MetricsError> {
        let status = Arc::new(StatusCounter::new());
        Ok(Self {
            pipeline: SubmissionPipeline::new(&config, status.clone(), clock),
            mailer,
            status,
            metrics: RelayMetrics::new()?,
            config,
            started_at: Utc::now(),
        })
    }
}

/// Status view body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub submission_count: u64,
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route(
            "/api/submit",
            get(submit_read).post(submit).fallback(method_not_allowed),
        )
        .route("/api/status", get(status).fallback(method_not_allowed))
        .route("/health", get(health))
        .route("/healthz", get(health));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn client_identity(state: &AppState, addr: SocketAddr, headers: &HeaderMap) -> ClientIdentity {
    ClientIdentity::resolve(addr.ip(), headers, state.config.trusted_proxy_hops)
}

/// GET on the submit endpoint.
pub async fn submit_read(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let client = client_identity(&state, addr, &headers);
    let result = state.pipeline.handle(InboundCall::Read, &client).await;
    respond(&state, result).await
}

/// POST a contact form submission.
///
/// Only bodies that are not a JSON object are refused here. They get a
/// generic JSON 400 and never reach the limiter.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> Response {
    let client = client_identity(&state, addr, &headers);
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(client = %client, error = %rejection, "Unreadable submission body");
            state.metrics.submission(Rejection::MalformedBody.code());
            return Rejection::MalformedBody.into_response();
        }
    };
    debug!(
        client = %client,
        fields = request.fields.len(),
        origin = ?request.origin,
        "Processing submission"
    );

    let result = state.pipeline.handle(InboundCall::Write(request), &client).await;
    respond(&state, result).await
}

async fn respond(state: &AppState, result: PipelineResult) -> Response {
    match result {
        PipelineResult::Redirected(location) => {
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        PipelineResult::Rejected(rejection) => {
            state.metrics.submission(rejection.code());
            rejection.into_response()
        }
        PipelineResult::Accepted(accepted) => {
            state.metrics.submission("accepted");
            match state.mailer.send(&accepted.email).await {
                Ok(()) => {
                    state.metrics.delivery(true);
                    info!(origin = %accepted.submission.origin, "Email sent successfully");
                    (
                        StatusCode::OK,
                        Json(json!({ "message": "Form submitted successfully!" })),
                    )
                        .into_response()
                }
                Err(err) => {
                    state.metrics.delivery(false);
                    error!(error = %err, "Error sending email");
                    Rejection::DeliveryFailed.into_response()
                }
            }
        }
    }
}

/// Read-only status view.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK",
        submission_count: state.status.current_count(),
        message: "API is operational",
    })
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-relay",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state
        .metrics
        .set_tracked_clients(state.pipeline.limiter().tracked_clients().await);

    match state.metrics.encode_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "message": "Method not allowed" })),
    )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Internal server error" })),
    )
        .into_response()
}
