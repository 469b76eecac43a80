use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::store::StoreError;

/// Default number of attempts for connectivity retries.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;
/// Default pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Fixed-delay retry for store calls that fail on connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u8,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u8, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max = self.max_attempts.max(1);
        let mut first_error: Option<String> = None;
        let mut attempt: u8 = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = max,
                        error = %e,
                        "Transient store failure, retrying"
                    );
                    first_error.get_or_insert_with(|| e.to_string());
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if let Some(first_error) = first_error {
                        warn!(
                            operation = label,
                            attempts = attempt,
                            first_error = %first_error,
                            "Retries exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
