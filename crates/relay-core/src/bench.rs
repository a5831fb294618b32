//! Benchmark harness: sample prompts, fire every request at once, wait for
//! all of them to settle, then aggregate latency statistics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::prelude::*;
use relay_common::{RelayError, Result};
use relay_upstream::{ChatCompletionEndpoint, ChatCompletionRequest, ChatMessage};
use serde::{Deserialize, Serialize};

use crate::prompts::PromptSource;
use crate::stats;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// One synthesized chat-completion request.
pub type TestCase = ChatCompletionRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub number_of_requests: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Fixed seed for prompt sampling; random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_max_tokens() -> u32 { DEFAULT_MAX_TOKENS }
fn default_temperature() -> f64 { DEFAULT_TEMPERATURE }

impl BenchmarkRequest {
    pub fn new(number_of_requests: usize) -> Self {
        Self { number_of_requests, max_tokens: DEFAULT_MAX_TOKENS, temperature: DEFAULT_TEMPERATURE, seed: None }
    }

    pub fn validate(&self, max_requests: usize) -> Result<()> {
        if self.number_of_requests == 0 {
            return Err(RelayError::InvalidRequest("number_of_requests must be positive".into()));
        }
        if self.number_of_requests > max_requests {
            return Err(RelayError::InvalidRequest(format!(
                "number_of_requests {} exceeds the limit of {}",
                self.number_of_requests, max_requests
            )));
        }
        if self.max_tokens == 0 {
            return Err(RelayError::InvalidRequest("max_tokens must be positive".into()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(RelayError::InvalidRequest("temperature must be a non-negative number".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum RequestOutcome {
    Succeeded {
        request: TestCase,
        response_text: String,
        latency_ms: f64,
        finished_at: DateTime<Utc>,
    },
    Failed {
        request: TestCase,
        error_message: String,
        latency_ms: f64,
        finished_at: DateTime<Utc>,
    },
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool { matches!(self, Self::Succeeded { .. }) }

    pub fn latency_ms(&self) -> f64 {
        match self {
            Self::Succeeded { latency_ms, .. } | Self::Failed { latency_ms, .. } => *latency_ms,
        }
    }

    pub fn request(&self) -> &TestCase {
        match self {
            Self::Succeeded { request, .. } | Self::Failed { request, .. } => request,
        }
    }
}

/// Aggregate written to the results artifact and returned to the caller.
/// Latencies are milliseconds; `average_latency` is `null` when nothing succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub total_response_time_in_milliseconds_p50: f64,
    pub total_response_time_in_milliseconds_p90: f64,
    pub total_response_time_in_milliseconds_p99: f64,
    pub average_latency: Option<f64>,
    pub total_succeeded: usize,
    pub total_failed: usize,
    pub number_of_requests: usize,
    pub total_time: f64,
    pub requests_per_second: f64,
}

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub model: String,
    pub results_path: PathBuf,
}

#[derive(Debug)]
pub struct BenchmarkRun {
    pub report: BenchmarkReport,
    pub outcomes: Vec<RequestOutcome>,
}

/// Draws `n` prompts uniformly with replacement.
pub fn sample_prompts<R: Rng + ?Sized>(pool: &[String], n: usize, rng: &mut R) -> Result<Vec<String>> {
    if pool.is_empty() { return Err(RelayError::EmptyPromptPool); }
    Ok((0..n).map(|_| pool[rng.gen_range(0..pool.len())].clone()).collect())
}

pub fn build_test_case(model: &str, prompt: String, max_tokens: u32, temperature: f64) -> TestCase {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        max_tokens,
        temperature,
        stream: false,
    }
}

async fn dispatch_one(endpoint: &dyn ChatCompletionEndpoint, request: TestCase) -> RequestOutcome {
    let start = Instant::now();
    let result = endpoint.complete(&request).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let finished_at = Utc::now();
    match result {
        Ok(response_text) => RequestOutcome::Succeeded { request, response_text, latency_ms, finished_at },
        Err(e) => {
            tracing::debug!(target: "bench", "request failed after {:.1}ms: {}", latency_ms, e);
            RequestOutcome::Failed { request, error_message: e.to_string(), latency_ms, finished_at }
        }
    }
}

/// Runs every case concurrently and returns one outcome per case, in input order.
pub async fn dispatch_all(endpoint: Arc<dyn ChatCompletionEndpoint>, cases: Vec<TestCase>) -> Vec<RequestOutcome> {
    let mut tasks = Vec::with_capacity(cases.len());
    for case in cases {
        let ep = endpoint.clone();
        let spawned = case.clone();
        tasks.push((case, tokio::spawn(async move { dispatch_one(ep.as_ref(), spawned).await })));
    }
    let mut outcomes = Vec::with_capacity(tasks.len());
    for (case, task) in tasks {
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => RequestOutcome::Failed {
                request: case,
                error_message: format!("dispatch task failed: {e}"),
                latency_ms: 0.0,
                finished_at: Utc::now(),
            },
        };
        outcomes.push(outcome);
    }
    outcomes
}

pub fn aggregate(number_of_requests: usize, outcomes: &[RequestOutcome], elapsed: Duration) -> BenchmarkReport {
    let mut latencies: Vec<f64> = outcomes.iter().filter(|o| o.is_success()).map(|o| o.latency_ms()).collect();
    stats::sort_latencies(&mut latencies);
    let total_succeeded = latencies.len();
    BenchmarkReport {
        total_response_time_in_milliseconds_p50: stats::percentile(&latencies, 50.0),
        total_response_time_in_milliseconds_p90: stats::percentile(&latencies, 90.0),
        total_response_time_in_milliseconds_p99: stats::percentile(&latencies, 99.0),
        average_latency: stats::mean(&latencies),
        total_succeeded,
        total_failed: outcomes.len() - total_succeeded,
        number_of_requests,
        total_time: elapsed.as_secs_f64() * 1000.0,
        requests_per_second: stats::requests_per_second(total_succeeded, elapsed.as_secs_f64()),
    }
}

/// Overwrites `path` with the pretty-printed report.
pub async fn write_report(path: &Path, report: &BenchmarkReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

pub async fn read_report(path: &Path) -> Result<BenchmarkReport> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub async fn run(
    req: &BenchmarkRequest,
    prompts: &PromptSource,
    endpoint: Arc<dyn ChatCompletionEndpoint>,
    settings: &HarnessSettings,
) -> Result<BenchmarkRun> {
    let start = Instant::now();
    let sampled = {
        let mut rng: StdRng = match req.seed { Some(s) => SeedableRng::seed_from_u64(s), None => StdRng::from_entropy() };
        sample_prompts(prompts.prompts(), req.number_of_requests, &mut rng)?
    };
    let cases: Vec<TestCase> = sampled
        .into_iter()
        .map(|p| build_test_case(&settings.model, p, req.max_tokens, req.temperature))
        .collect();
    tracing::info!(target: "bench", "dispatching {} requests (max_tokens={}, temperature={})", cases.len(), req.max_tokens, req.temperature);

    let outcomes = dispatch_all(endpoint, cases).await;
    let report = aggregate(req.number_of_requests, &outcomes, start.elapsed());
    tracing::info!(
        target: "bench",
        "benchmark finished: {} ok, {} failed, p50={:.1}ms p99={:.1}ms, {:.2} req/s",
        report.total_succeeded,
        report.total_failed,
        report.total_response_time_in_milliseconds_p50,
        report.total_response_time_in_milliseconds_p99,
        report.requests_per_second
    );

    write_report(&settings.results_path, &report).await?;
    Ok(BenchmarkRun { report, outcomes })
}
