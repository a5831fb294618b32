//! Prompt sourcing and the benchmark harness.

pub mod bench;
pub mod prompts;
pub mod stats;
