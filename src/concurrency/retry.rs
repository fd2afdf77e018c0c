use std::{thread, time::Duration};

use crate::{config::RetryPolicy, errors::GraphError, graph::GraphStore};

/// Delay before retry `n` (0-based): `initial_delay_ms * 2^n`, saturating.
pub fn backoff_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    Duration::from_millis(policy.initial_delay_ms.saturating_mul(factor))
}

/// Invokes `op`, retrying busy/locked failures with exponential backoff.
///
/// Non-transient failures propagate immediately. After `max_retries`
/// consecutive busy failures (at least one attempt is always made) the
/// result is [`GraphError::RetryExhausted`] carrying the last busy message.
pub fn with_retry<T, F>(policy: &RetryPolicy, op: F) -> Result<T, GraphError>
where
    F: FnMut() -> Result<T, GraphError>,
{
    retry_loop(policy, op, |_, _| {})
}

pub(crate) fn retry_loop<T, F, R>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_retry: R,
) -> Result<T, GraphError>
where
    F: FnMut() -> Result<T, GraphError>,
    R: FnMut(u32, &GraphError),
{
    let max_attempts = policy.max_retries.max(1);
    let mut failures = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                failures += 1;
                if failures >= max_attempts {
                    let last_message = match err {
                        GraphError::Busy(message) => message,
                        other => other.to_string(),
                    };
                    return Err(GraphError::RetryExhausted {
                        attempts: failures,
                        last_message,
                    });
                }
                let retry = failures - 1;
                let delay = backoff_delay(policy, retry);
                tracing::warn!(
                    target: "relgraph::retry",
                    retry,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "storage busy, backing off"
                );
                on_retry(retry, &err);
                thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}

impl GraphStore {
    /// [`with_retry`] using this store's configured policy.
    pub fn with_retry<T, F>(&self, op: F) -> Result<T, GraphError>
    where
        F: FnMut() -> Result<T, GraphError>,
    {
        retry_loop(&self.config().retry, op, |_, _| {
            self.metrics.record_busy_retry()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay_ms: 1,
        }
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 10,
        };
        assert_eq!(backoff_delay(&policy, 0), Duration::from_millis(10));
        assert_eq!(backoff_delay(&policy, 3), Duration::from_millis(80));
        assert_eq!(backoff_delay(&policy, 200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn busy_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(&fast_policy(5), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(GraphError::busy("database is locked"))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.expect("eventually succeeds"), 3);
    }

    #[test]
    fn non_transient_failures_propagate_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), || {
            calls.set(calls.get() + 1);
            Err(GraphError::validation("bad kind"))
        });
        assert!(matches!(result, Err(GraphError::Validation(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn exhaustion_preserves_last_message() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), || {
            calls.set(calls.get() + 1);
            Err(GraphError::busy(format!("locked #{}", calls.get())))
        });
        match result {
            Err(GraphError::RetryExhausted {
                attempts,
                last_message,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_message, "locked #3");
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(calls.get(), 3);
    }
}
