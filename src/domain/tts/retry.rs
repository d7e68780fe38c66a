use super::classification::{classify, ErrorClassification};
use super::error::ProviderError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
        }
    }
}

impl RetryPolicy {
    /// `min(max_delay, base_delay * 2^(attempt-1))`, attempt is 1-based
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32, classification: ErrorClassification, error: &ProviderError) -> Duration {
        match (classification, error.retry_after()) {
            (ErrorClassification::QuotaExceeded, Some(vendor_delay)) => vendor_delay.min(self.max_delay),
            _ => self.backoff_delay(attempt),
        }
    }
}

#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    pub attempts: u32,
    /// Delays slept between attempts, in order
    pub delays: Vec<Duration>,
}

impl<T> RetryOutcome<T> {
    pub fn classification(&self) -> Option<ErrorClassification> {
        self.result.as_ref().err().map(classify)
    }
}

/// Classified retry around a single provider call
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable
    /// classification, or the attempt budget is spent.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delays = Vec::new();
        let mut attempt = 1;

        loop {
            tracing::debug!(label = label, attempt = attempt, max_attempts = max_attempts, "Attempting provider call");

            let error = match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        delays,
                    };
                }
                Err(error) => error,
            };

            let classification = classify(&error);
            if !classification.is_retryable() || attempt >= max_attempts {
                tracing::warn!(
                    label = label,
                    attempt = attempt,
                    classification = %classification,
                    error = %error,
                    "Provider call failed, giving up"
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                    delays,
                };
            }

            let delay = self.policy.delay_for(attempt, classification, &error);
            tracing::warn!(
                label = label,
                attempt = attempt,
                classification = %classification,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Provider call failed, retrying after backoff"
            );

            tokio::time::sleep(delay).await;
            delays.push(delay);
            attempt += 1;
        }
    }
}
