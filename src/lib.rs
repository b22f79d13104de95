//! patchbench library crate
//!
//! Batch orchestration around a remote text-completion service: annotate
//! source snippets for security verdicts, generate full patches for
//! insecure ones, expand them into vulnerability-preserving variants, and
//! aggregate the re-scored results into ratio and coverage statistics.

pub mod batch;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod protocol;
pub mod record;
pub mod stats;
