pub type Result<T> = core::result::Result<T, RelayError>;

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("prompt pool is empty; cannot sample benchmark prompts")]
    EmptyPromptPool,
    #[error("upstream error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

impl RelayError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream { status: None, message: message.into() }
    }

    /// Non-2xx reply from the inference server.
    pub fn status(status: u16) -> Self {
        Self::Upstream { status: Some(status), message: format!("HTTP error! status: {status}") }
    }
}

pub mod config {
    use serde::Deserialize;
    use std::env;
    use std::path::{Path, PathBuf};

    use crate::{RelayError, Result};

    pub const DEFAULT_MODEL: &str = "TinyLlama/TinyLlama-1.1B-Chat-v1.0";

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct RelayConfig {
        pub port: u16,
        /// Base URL of the inference server, without the `/v1/...` suffix.
        pub upstream_url: String,
        pub api_key: Option<String>,
        pub model: String,
        pub dataset_path: Option<PathBuf>,
        pub max_prompts: usize,
        pub results_path: PathBuf,
        pub max_requests_per_run: usize,
        pub upstream_timeout_secs: Option<u64>,
    }

    impl Default for RelayConfig {
        fn default() -> Self {
            Self {
                port: 3000,
                upstream_url: "http://localhost:8000".into(),
                api_key: None,
                model: DEFAULT_MODEL.into(),
                dataset_path: None,
                max_prompts: 1000,
                results_path: PathBuf::from("benchmark-results.json"),
                max_requests_per_run: 10_000,
                upstream_timeout_secs: None,
            }
        }
    }

    impl RelayConfig {
        /// Reads `RELAY_CONFIG` if set, otherwise defaults with `RELAY_*` overrides.
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("RELAY_CONFIG") {
                return Self::from_yaml_file(path);
            }
            Self::from_lookup(|key| env::var(key).ok())
        }

        pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path)
                .map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))?;
            serde_yaml::from_str::<RelayConfig>(&text)
                .map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
            let mut cfg = Self::default();
            if let Some(v) = lookup("RELAY_PORT").or_else(|| lookup("PORT")) { cfg.port = parse("RELAY_PORT", &v)?; }
            if let Some(v) = lookup("RELAY_UPSTREAM_URL") { cfg.upstream_url = v; }
            if let Some(v) = lookup("RELAY_API_KEY") { cfg.api_key = Some(v); }
            if let Some(v) = lookup("RELAY_MODEL") { cfg.model = v; }
            if let Some(v) = lookup("RELAY_DATASET") { cfg.dataset_path = Some(PathBuf::from(v)); }
            if let Some(v) = lookup("RELAY_MAX_PROMPTS") { cfg.max_prompts = parse("RELAY_MAX_PROMPTS", &v)?; }
            if let Some(v) = lookup("RELAY_RESULTS_PATH") { cfg.results_path = PathBuf::from(v); }
            if let Some(v) = lookup("RELAY_MAX_REQUESTS") { cfg.max_requests_per_run = parse("RELAY_MAX_REQUESTS", &v)?; }
            if let Some(v) = lookup("RELAY_UPSTREAM_TIMEOUT_SECS") { cfg.upstream_timeout_secs = Some(parse("RELAY_UPSTREAM_TIMEOUT_SECS", &v)?); }
            Ok(cfg)
        }
    }

    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        value.trim().parse().map_err(|e| RelayError::Config(format!("{key}={value:?}: {e}")))
    }
}
