//! HTTP API: chat-completion pass-through plus the benchmark endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_common::{config::RelayConfig, RelayError, Result};
use relay_core::bench::{self, BenchmarkReport, BenchmarkRequest, HarnessSettings};
use relay_core::prompts::{PromptOrigin, PromptSource};
use relay_upstream::{ChatCompletionEndpoint, HttpEndpoint};

#[derive(Clone)]
pub struct AppState {
    upstream: HttpEndpoint,
    bench_endpoint: Arc<dyn ChatCompletionEndpoint>,
    prompts: Arc<PromptSource>,
    settings: Arc<HarnessSettings>,
    max_requests_per_run: usize,
}

impl AppState {
    pub fn new(config: &RelayConfig, prompts: PromptSource) -> Result<Self> {
        let timeout = config.upstream_timeout_secs.map(Duration::from_secs);
        let upstream = HttpEndpoint::new(&config.upstream_url, config.api_key.clone(), timeout)?;
        Ok(Self {
            bench_endpoint: Arc::new(upstream.clone()),
            upstream,
            prompts: Arc::new(prompts),
            settings: Arc::new(HarnessSettings { model: config.model.clone(), results_path: config.results_path.clone() }),
            max_requests_per_run: config.max_requests_per_run,
        })
    }

    /// Sends benchmark traffic somewhere other than the pass-through upstream.
    pub fn with_bench_endpoint(mut self, endpoint: Arc<dyn ChatCompletionEndpoint>) -> Self {
        self.bench_endpoint = endpoint;
        self
    }
}

pub fn app(state: AppState) -> Router {
    relay_obs::init();
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/benchmark", post(benchmark))
        .route("/openapi.json", get(openapi))
        .with_state(state)
}

/// `RelayError` rendered as `{ "error": ... }` with a matching status code.
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self { Self(e) }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self { Self(RelayError::InvalidRequest(e.body_text())) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn metrics() -> impl IntoResponse {
    let (content_type, buffer) = relay_obs::render();
    ([(header::CONTENT_TYPE, content_type)], buffer)
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let origin = match state.prompts.origin() {
        PromptOrigin::Dataset(path) => format!("dataset {}", path.display()),
        PromptOrigin::Builtin => "built-in list".to_string(),
        PromptOrigin::Inline => "inline list".to_string(),
    };
    if state.prompts.is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "not-ready: no prompts".to_string());
    }
    (StatusCode::OK, format!("ready: {} prompts from {}", state.prompts.len(), origin))
}

async fn chat_completions(
    State(state): State<AppState>,
    body: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(body) = body?;
    relay_obs::record_proxy_request();
    let resp = match state.upstream.forward(&body).await {
        Ok(resp) => resp,
        Err(e) => {
            relay_obs::record_proxy_error();
            tracing::error!(target: "api", "error in chat completions: {}", e);
            return Err(ApiError(e));
        }
    };

    let is_stream = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/event-stream"));
    if is_stream {
        tracing::debug!(target: "api", "relaying event stream");
        return Ok(([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(resp.bytes_stream())).into_response());
    }

    let json: serde_json::Value = resp.json().await.map_err(|e| {
        relay_obs::record_proxy_error();
        ApiError(RelayError::MalformedResponse(e.to_string()))
    })?;
    Ok(Json(json).into_response())
}

async fn benchmark(
    State(state): State<AppState>,
    body: std::result::Result<Json<BenchmarkRequest>, JsonRejection>,
) -> std::result::Result<Json<BenchmarkReport>, ApiError> {
    let Json(req) = body?;
    req.validate(state.max_requests_per_run)?;
    tracing::info!(target: "api", "benchmark request: {} requests", req.number_of_requests);

    let run = bench::run(&req, &state.prompts, state.bench_endpoint.clone(), &state.settings).await?;
    relay_obs::record_benchmark_run();
    for outcome in &run.outcomes {
        relay_obs::record_benchmark_request(outcome.is_success(), outcome.latency_ms());
    }
    Ok(Json(run.report))
}

async fn openapi() -> impl IntoResponse {
    let spec = serde_json::json!({
        "openapi": "3.0.0",
        "info": {"title": "Inference Relay API", "version": "0.1.0"},
        "paths": {
            "/v1/chat/completions": {"post": {"summary": "Pass-through to the inference server"}},
            "/benchmark": {"post": {"summary": "Run a concurrent benchmark against the inference server"}},
            "/metrics": {"get": {"summary": "Prometheus metrics"}},
            "/healthz": {"get": {"summary": "health"}},
            "/readyz": {"get": {"summary": "readiness"}}
        }
    });
    Json(spec)
}
