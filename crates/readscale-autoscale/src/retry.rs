//! Retrying executor — bounded exponential backoff around one attempt.
//!
//! Every error is retried the same way. The shutdown signal is checked
//! before each attempt and races each backoff sleep, so a deadline or
//! Ctrl-C interrupts a wait instead of outliving it.

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use readscale_core::RetryPolicy;

/// Aggregate failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `op` until it succeeds, `policy.max_attempts` is reached, or
/// `shutdown` flips to true. `op` receives the 1-based attempt number.
///
/// The last failure is not followed by a sleep.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = None;
    let mut attempt = 0;

    loop {
        if *shutdown.borrow() {
            warn!(attempts = attempt, "shutdown requested, not retrying");
            return Err(RetryError::Cancelled { attempts: attempt, last });
        }
        attempt += 1;

        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            warn!(attempt, error = %err, "attempt failed, giving up");
            return Err(RetryError::Exhausted { attempts: attempt, last: err });
        }

        let backoff = policy.backoff_after(attempt);
        warn!(
            attempt,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "attempt failed, retrying"
        );
        last = Some(err);

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown_requested(shutdown) => {
                warn!(attempts = attempt, "shutdown requested during backoff");
                return Err(RetryError::Cancelled { attempts: attempt, last });
            }
        }
    }
}

/// Resolves once the shutdown flag is true. Pends forever if the sender
/// is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
