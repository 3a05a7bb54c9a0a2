use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

// ============================================================================
// Fixed-Delay Retry
// ============================================================================
//
// Bounded retry for transient failures with a fixed inter-attempt delay.
// No backoff, no jitter: the bottleneck is the durable store, not contention.
// The delay wait races against the shutdown signal so cancellation is
// observed mid-retry instead of after it.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }
}

/// Terminal state of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// Operation succeeded within the attempt limit.
    Success(T),
    /// Operation kept failing transiently until the attempts ran out.
    Exhausted(E),
    /// Operation failed in a way retrying cannot help.
    Permanent(E),
    /// Shutdown was observed during a retry wait.
    Cancelled,
}

/// Classifies an error as transient (worth retrying) or permanent.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Drives `operation` to a terminal state: success, exhausted attempts,
/// permanent failure, or cancellation observed via `shutdown`.
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    shutdown: &mut watch::Receiver<bool>,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return RetryOutcome::Success(result);
            }
            Err(error) if !error.is_transient() => {
                tracing::error!(error = %error, "permanent failure, not retrying");
                return RetryOutcome::Permanent(error);
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempt,
                        error = %error,
                        "operation failed after all attempts"
                    );
                    return RetryOutcome::Exhausted(error);
                }

                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %error,
                    delay_ms = config.delay.as_millis(),
                    "transient failure, retrying after delay"
                );

                tokio::select! {
                    _ = sleep(config.delay) => {}
                    _ = shutdown.changed() => {
                        tracing::info!(attempt, "shutdown observed mid-retry");
                        return RetryOutcome::Cancelled;
                    }
                }
            }
        }
    }
}
