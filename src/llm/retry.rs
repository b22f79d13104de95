//! Retrying invoker.
//!
//! Wraps a [`Completion`] client with bounded attempts and randomized
//! exponential backoff so concurrent items do not hammer the endpoint in
//! lockstep after a shared failure.

use crate::error::{InvokeError, LlmError};
use crate::llm::client::Completion;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Retry behavior, injected as a value.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Floor for every backoff delay.
    pub min_delay: Duration,
    /// Ceiling the exponential growth saturates at.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Upper bound for the delay after failed attempt `attempt` (1-based):
    /// `min_delay * 2^(attempt-1)`, saturating at `max_delay`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(32);
        let scaled = self
            .min_delay
            .as_millis()
            .saturating_mul(u128::from(factor));
        let capped = scaled.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }

    /// Actual delay: uniform between the floor and the attempt's ceiling.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let floor = self.min_delay.as_millis() as u64;
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling <= floor {
            return Duration::from_millis(floor);
        }
        let ms = rand::rng().random_range(floor..=ceiling);
        Duration::from_millis(ms)
    }
}

/// Seam the pipelines call through: one prompt in, raw completion text out,
/// retries already spent. Stubbed directly in tests.
pub trait Invoke {
    fn invoke(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, InvokeError>>;
}

/// [`Invoke`] implementation that retries a [`Completion`] client.
pub struct Invoker<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: Completion> Invoker<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }
}

impl<C: Completion> Invoke for Invoker<C> {
    async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last: Option<LlmError> = None;

        for attempt in 1..=attempts {
            match self.client.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if attempt < attempts {
                        let delay = self.policy.jittered_delay(attempt);
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "completion call failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last = Some(err);
                }
            }
        }

        Err(InvokeError {
            attempts,
            // max_attempts >= 1, so at least one error was recorded
            source: last.unwrap_or(LlmError::EmptyChoices),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl Completion for FlakyClient {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(LlmError::Protocol {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok("ok".into())
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_ceiling_doubles_then_saturates() {
        let policy = RetryPolicy {
            max_attempts: 5,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.backoff_ceiling(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_ceiling(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_invoker_recovers_after_transient_failures() {
        let invoker = Invoker::new(
            FlakyClient {
                calls: AtomicU32::new(0),
                fail_first: 2,
            },
            fast_policy(3),
        );
        let out = invoker.invoke("p").await.unwrap();
        assert_eq!(out, "ok");
    }

    #[tokio::test]
    async fn test_invoker_exhausts_after_max_attempts() {
        let client = FlakyClient {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        };
        let invoker = Invoker::new(client, fast_policy(3));
        let err = invoker.invoke("p").await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.source, LlmError::Protocol { status: 503, .. }));
        assert_eq!(invoker.client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invoker_single_attempt_no_sleep() {
        let client = FlakyClient {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        };
        let invoker = Invoker::new(client, fast_policy(1));
        let err = invoker.invoke("p").await.unwrap_err();
        assert_eq!(err.attempts, 1);
    }
}
