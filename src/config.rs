//! Run configuration.
//!
//! Everything the dispatcher and invoker need travels in these structs,
//! passed by value at construction time. There is no process-wide mutable
//! state.

use std::time::Duration;

/// Connection and generation parameters for the completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the service, e.g. `https://api.example.com/v1/`.
    /// The chat-completions path is appended to this.
    pub base_url: String,
    /// Bearer token sent on every request.
    pub api_key: String,
    /// Model identifier forwarded verbatim.
    pub model: String,
    /// Token budget per completion.
    pub max_tokens: u32,
    /// Pinned to 0.0 for deterministic verdicts.
    pub temperature: f32,
    /// Whole-request timeout, connection included.
    pub request_timeout: Duration,
}

impl LlmConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.0,
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Full chat-completions endpoint URL.
    pub fn endpoint(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}chat/completions", self.base_url)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Ceiling on in-flight requests. Never zero.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl BatchConfig {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}
