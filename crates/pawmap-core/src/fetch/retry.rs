use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ApiError;

use super::QueryStrategy;

/// Full passes over the strategy chain before giving up.
pub const RETRY_PASSES: u32 = 2;

/// Pause between consecutive attempts, in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub passes: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Upper bound on attempts for a chain of `strategies` entries.
    pub fn max_attempts(&self, strategies: usize) -> usize {
        self.passes as usize * strategies
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            passes: RETRY_PASSES,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome<T> {
    Success { strategy_index: usize, value: T },
    Exhausted { attempts: usize, last_error: Option<ApiError> },
    Cancelled,
}

/// Try each strategy in order until one succeeds, wrapping back to the
/// first after a full cycle, for at most `policy.passes` cycles.
///
/// Every failure is logged and swallowed. `policy.delay` separates
/// consecutive attempts. Cancellation is honored while an attempt or a
/// delay is pending.
pub async fn run_with_fallback<'a, T, F, Fut>(
    strategies: &'a [Box<dyn QueryStrategy>],
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> RunOutcome<T>
where
    F: FnMut(usize, &'a dyn QueryStrategy) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts(strategies.len());
    let mut last_error = None;

    for n in 0..max_attempts {
        if n > 0 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RunOutcome::Cancelled,
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }

        let index = n % strategies.len();
        let pass = n / strategies.len() + 1;
        let strategy: &'a dyn QueryStrategy = strategies[index].as_ref();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RunOutcome::Cancelled,
            result = attempt(index, strategy) => result,
        };

        match result {
            Ok(value) => {
                debug!(strategy = strategy.name(), pass, "Query strategy succeeded");
                return RunOutcome::Success {
                    strategy_index: index,
                    value,
                };
            }
            Err(e) => {
                warn!(
                    strategy = strategy.name(),
                    pass,
                    client_error = e.is_client_error(),
                    error = %e,
                    "Query strategy failed"
                );
                last_error = Some(e);
            }
        }
    }

    RunOutcome::Exhausted {
        attempts: max_attempts,
        last_error,
    }
}
