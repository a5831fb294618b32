//! Prompt pool used by the benchmark harness.
//!
//! Prompts come from a conversation dataset (a JSON array of records, each
//! holding a list of role-tagged turns) or, when that is unavailable, from a
//! small built-in list.

use std::path::{Path, PathBuf};

use relay_common::Result;
use serde_json::Value;

pub const MAX_PROMPT_CHARS: usize = 500;
const CODE_FENCE: &str = "```";

pub const BUILTIN_PROMPTS: [&str; 5] = [
    "Explain quantum computing in simple terms.",
    "Write a short story about a robot.",
    "What are the benefits of exercise?",
    "How does photosynthesis work?",
    "Explain the concept of blockchain.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOrigin {
    Dataset(PathBuf),
    Builtin,
    Inline,
}

#[derive(Debug, Clone)]
pub struct PromptSource {
    prompts: Vec<String>,
    origin: PromptOrigin,
}

impl PromptSource {
    pub fn builtin() -> Self {
        Self { prompts: BUILTIN_PROMPTS.iter().map(|p| p.to_string()).collect(), origin: PromptOrigin::Builtin }
    }

    /// Wraps an explicit list as-is; no filtering, and an empty list stays empty.
    pub fn from_prompts(prompts: Vec<String>) -> Self {
        Self { prompts, origin: PromptOrigin::Inline }
    }

    /// Loads at most `max_prompts` prompts from `path`. Never fails: any
    /// problem with the dataset falls back to [`PromptSource::builtin`].
    pub fn load(path: &Path, max_prompts: usize) -> Self {
        match read_dataset(path, max_prompts) {
            Ok(prompts) if !prompts.is_empty() => {
                tracing::info!(target: "prompts", "loaded {} prompts from {}", prompts.len(), path.display());
                Self { prompts, origin: PromptOrigin::Dataset(path.to_path_buf()) }
            }
            Ok(_) => {
                tracing::warn!(target: "prompts", "no usable prompts in {}, using built-in prompts", path.display());
                Self::builtin()
            }
            Err(e) => {
                tracing::warn!(target: "prompts", "failed to load dataset {}: {}; using built-in prompts", path.display(), e);
                Self::builtin()
            }
        }
    }

    /// Like [`PromptSource::load`], with no path meaning the built-in list.
    pub fn from_config(path: Option<&Path>, max_prompts: usize) -> Self {
        match path {
            Some(p) => Self::load(p, max_prompts),
            None => {
                tracing::info!(target: "prompts", "no dataset configured, using built-in prompts");
                Self::builtin()
            }
        }
    }

    pub fn prompts(&self) -> &[String] { &self.prompts }
    pub fn len(&self) -> usize { self.prompts.len() }
    pub fn is_empty(&self) -> bool { self.prompts.is_empty() }
    pub fn origin(&self) -> &PromptOrigin { &self.origin }
}

fn read_dataset(path: &Path, max_prompts: usize) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let records: Vec<Value> = serde_json::from_str(&text)?;
    let candidates = records.iter().map(first_user_turn);
    Ok(filter_prompts(candidates, max_prompts))
}

/// Text of the first human/user turn. Records or turns of the wrong shape
/// yield an empty candidate, which the filter drops.
fn first_user_turn(record: &Value) -> String {
    let turns = record
        .get("conversations")
        .or_else(|| record.get("messages"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    turns
        .iter()
        .find(|t| {
            let role = t.get("from").or_else(|| t.get("role")).and_then(Value::as_str).unwrap_or_default();
            role.eq_ignore_ascii_case("human") || role.eq_ignore_ascii_case("user")
        })
        .and_then(|t| t.get("value").or_else(|| t.get("content")))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// True when a candidate may be used as a benchmark prompt.
pub fn is_usable_prompt(candidate: &str) -> bool {
    let len = candidate.chars().count();
    len > 0 && len < MAX_PROMPT_CHARS && !candidate.contains(CODE_FENCE)
}

pub fn filter_prompts<I>(candidates: I, max_prompts: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    candidates.into_iter().filter(|c| is_usable_prompt(c)).take(max_prompts).collect()
}

