//! Bounded exponential backoff around a single section generation call.

use std::time::Duration;

use crate::error::GenerationError;
use crate::sections::{SectionBody, SectionKey};

use super::{PageSubject, SectionGenerator};

/// Backoff schedule for transient generation failures.
///
/// Attempts made here all belong to one regeneration pass; they never count
/// towards a section's `passes_used`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per pass, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Retries without sleeping; meant for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): `min(base * 2^(retry-1), max)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Call `generator` for one section, retrying transient failures.
///
/// `Rejected` is returned immediately; `Unavailable` is returned once the
/// attempts are used up. Only this task is suspended while backing off.
pub async fn generate_with_backoff<S, G>(
    generator: &G,
    subject: &S,
    key: SectionKey,
    policy: &RetryPolicy,
) -> Result<SectionBody, GenerationError>
where
    S: PageSubject,
    G: SectionGenerator<S> + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            tracing::debug!(
                page = %subject.label(),
                section = %key,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying section generation after transient failure"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        match generator.generate(subject, key).await {
            Ok(body) => return Ok(body),
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    page = %subject.label(),
                    section = %key,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %err,
                    "Transient generation error"
                );
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        GenerationError::Unavailable("retries exhausted with no error captured".to_string())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::units::ConversionPairTask;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures_before_success: usize,
        error: GenerationError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SectionGenerator for Flaky {
        async fn generate(
            &self,
            _task: &ConversionPairTask,
            _key: SectionKey,
        ) -> Result<SectionBody, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(self.error.clone())
            } else {
                Ok(SectionBody::Prose("<p>ok</p>".to_string()))
            }
        }
    }

    fn task() -> ConversionPairTask {
        ConversionPairTask::new(
            "SQ_M", "SQ_FT", "Square Meter", "Square Feet", 10.7639, "Pan-India", "Pan-India",
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_default_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
        assert_eq!(policy.delay_for(100), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let generator = Flaky {
            failures_before_success: 2,
            error: GenerationError::Unavailable("503".to_string()),
            calls: AtomicUsize::new(0),
        };
        let result =
            generate_with_backoff(&generator, &task(), SectionKey::Examples, &RetryPolicy::immediate(3))
                .await;
        assert!(result.is_ok());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust() {
        let generator = Flaky {
            failures_before_success: 10,
            error: GenerationError::Unavailable("timeout".to_string()),
            calls: AtomicUsize::new(0),
        };
        let result =
            generate_with_backoff(&generator, &task(), SectionKey::Examples, &RetryPolicy::immediate(3))
                .await;
        assert_eq!(
            result,
            Err(GenerationError::Unavailable("timeout".to_string()))
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let generator = Flaky {
            failures_before_success: 10,
            error: GenerationError::Rejected("policy".to_string()),
            calls: AtomicUsize::new(0),
        };
        let result =
            generate_with_backoff(&generator, &task(), SectionKey::Examples, &RetryPolicy::immediate(3))
                .await;
        assert!(matches!(result, Err(GenerationError::Rejected(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
