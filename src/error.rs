//! Error taxonomy for the pipeline.
//!
//! Transport and protocol failures are retryable and stay inside the
//! invoker; exhaustion and contract violations are caught at the per-item
//! boundary and never abort a batch.

use thiserror::Error;

/// Maximum number of characters of a remote error body kept for diagnostics.
pub const BODY_PREVIEW_CHARS: usize = 500;

/// A single completion call failed.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("completion endpoint returned status {status}: {body}")]
    Protocol { status: u16, body: String },

    /// Status 200 but the body did not carry a completion.
    #[error("completion response had no choices")]
    EmptyChoices,
}

/// All retry attempts for one request were consumed.
#[derive(Debug, Error)]
#[error("retries exhausted after {attempts} attempts: {source}")]
pub struct InvokeError {
    pub attempts: u32,
    #[source]
    pub source: LlmError,
}

/// Input JSON did not match any accepted record shape.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("input must be a JSON array of objects or a wrapper object, got {found}")]
    UnsupportedRoot { found: &'static str },
    #[error("wrapper object has no array under any of the known keys")]
    NoWrapperKey,
}

/// The descriptor-extraction call did not yield a JSON array of strings.
///
/// Callers treat this as "no vulnerabilities found", not a hard failure.
#[derive(Debug, Error)]
#[error("descriptor list could not be parsed: {reason}")]
pub struct DescriptorError {
    pub reason: String,
}

/// Truncate text for log/diagnostic output (Unicode-safe).
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_short_input_untouched() {
        assert_eq!(truncate_str("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        let s = "héllo wörld";
        let t = truncate_str(s, 4);
        assert_eq!(t, "héll");
    }

    #[test]
    fn test_invoke_error_carries_cause() {
        let err = InvokeError {
            attempts: 3,
            source: LlmError::Protocol {
                status: 503,
                body: "overloaded".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("503"));
    }
}
