use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::{Args, Parser, Subcommand};
use opentelemetry_otlp::WithExportConfig;
use relay_api::{app, AppState};
use relay_common::config::RelayConfig;
use relay_core::bench::{self, BenchmarkRequest, HarnessSettings, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use relay_core::prompts::PromptSource;
use relay_upstream::{mock::MockEndpoint, ChatCompletionEndpoint, HttpEndpoint};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Chat-completion relay and benchmark harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Serve(ServeArgs),
    Bench(BenchArgs),
    Prompts(PromptsArgs),
    Version,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(short, long)]
    port: Option<u16>,
    /// Base URL of the inference server
    #[arg(short, long)]
    upstream: Option<String>,
}

#[derive(Args, Debug)]
struct BenchArgs {
    #[arg(short = 'n', long, default_value_t = 10)]
    requests: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f64,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(short, long)]
    upstream: Option<String>,
    /// Where to write the report (defaults to the configured results path)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Answer locally instead of calling the inference server
    #[arg(long)]
    mock: bool,
}

#[derive(Args, Debug)]
struct PromptsArgs {
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = RelayConfig::load().context("loading relay config")?;
    match cli.command {
        Commands::Serve(args) => serve(cfg, args).await,
        Commands::Bench(args) => run_bench(cfg, args).await,
        Commands::Prompts(args) => list_prompts(&cfg, args),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(mut cfg: RelayConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.port { cfg.port = port; }
    if let Some(upstream) = args.upstream { cfg.upstream_url = upstream; }

    let prompts = PromptSource::from_config(cfg.dataset_path.as_deref(), cfg.max_prompts);
    let state = AppState::new(&cfg, prompts)?;
    let app: Router = app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .with_context(|| format!("binding port {}", cfg.port))?;
    tracing::info!("listening on http://0.0.0.0:{}", cfg.port);
    tracing::info!("relaying to {}", cfg.upstream_url);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

async fn run_bench(mut cfg: RelayConfig, args: BenchArgs) -> anyhow::Result<()> {
    if let Some(upstream) = args.upstream { cfg.upstream_url = upstream; }
    let req = BenchmarkRequest {
        number_of_requests: args.requests,
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        seed: args.seed,
    };
    req.validate(cfg.max_requests_per_run)?;

    let prompts = PromptSource::from_config(cfg.dataset_path.as_deref(), cfg.max_prompts);
    let endpoint: Arc<dyn ChatCompletionEndpoint> = if args.mock {
        Arc::new(MockEndpoint::new())
    } else {
        Arc::new(HttpEndpoint::new(&cfg.upstream_url, cfg.api_key.clone(), cfg.upstream_timeout_secs.map(Duration::from_secs))?)
    };
    let settings = HarnessSettings { model: cfg.model.clone(), results_path: args.output.unwrap_or(cfg.results_path) };

    let run = bench::run(&req, &prompts, endpoint, &settings).await?;
    println!("{}", serde_json::to_string_pretty(&run.report)?);
    eprintln!("report written to {}", settings.results_path.display());
    Ok(())
}

fn list_prompts(cfg: &RelayConfig, args: PromptsArgs) -> anyhow::Result<()> {
    let prompts = PromptSource::from_config(cfg.dataset_path.as_deref(), cfg.max_prompts);
    println!("{} prompts ({:?})", prompts.len(), prompts.origin());
    for p in prompts.prompts().iter().take(args.limit) {
        println!("- {}", p.replace('\n', " "));
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .install_simple()
            .ok();
        if let Some(tracer) = tracer {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(OpenTelemetryLayer::new(tracer))
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
