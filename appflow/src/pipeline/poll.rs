//! Poll a status call until its result reaches a terminal state.

use super::retry::{retry_with_delay_if, RetryPolicy};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Why polling stopped without reaching the terminal state.
#[derive(Debug, Clone, Error)]
pub enum PollError<T, E> {
    /// The retry budget ran out.
    #[error("gave up after {attempts} attempts")]
    Exhausted {
        /// Status checks issued.
        attempts: usize,
        /// Most recent snapshot that was decoded, if any.
        last_observed: Option<T>,
        /// Failure of the final attempt when it was a call failure.
        last_error: Option<E>,
    },
    /// A failure that must not be retried.
    #[error("{0}")]
    Fatal(E),
}

/// One failed polling attempt.
enum Attempt<E> {
    NotTerminal,
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for Attempt<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTerminal => write!(f, "not yet in terminal state"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Repeatedly calls `fetch` until `is_terminal` holds for its result.
///
/// A non-terminal snapshot and a retryable call failure both consume one
/// retry and are followed by the policy's fixed delay. Failures rejected by
/// `is_retryable` end polling at once with [`PollError::Fatal`].
pub async fn poll_until_state<T, E, F, Fut, P, R>(
    policy: &RetryPolicy,
    key: &str,
    mut fetch: F,
    is_terminal: P,
    is_retryable: R,
) -> Result<T, PollError<T, E>>
where
    T: Clone,
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
    R: Fn(&E) -> bool,
{
    let last_observed: Mutex<Option<T>> = Mutex::new(None);
    let attempts = Mutex::new(0usize);

    let observed = &last_observed;
    let attempt_count = &attempts;
    let terminal = &is_terminal;

    let result = retry_with_delay_if(
        policy,
        key,
        move || {
            *attempt_count.lock() += 1;
            let call = fetch();
            async move {
                let snapshot = match call.await {
                    Ok(snapshot) => snapshot,
                    Err(e) => return Err(Attempt::Failed(e)),
                };
                let done = terminal(&snapshot);
                *observed.lock() = Some(snapshot.clone());
                if done {
                    Ok(snapshot)
                } else {
                    Err(Attempt::NotTerminal)
                }
            }
        },
        |attempt| match attempt {
            Attempt::NotTerminal => true,
            Attempt::Failed(e) => is_retryable(e),
        },
    )
    .await;

    let attempts = *attempts.lock();
    match result {
        Ok(snapshot) => {
            tracing::debug!(key, attempts, "Reached terminal state");
            Ok(snapshot)
        }
        Err(Attempt::Failed(e)) if !is_retryable(&e) => Err(PollError::Fatal(e)),
        Err(attempt) => {
            let last_error = match attempt {
                Attempt::Failed(e) => Some(e),
                Attempt::NotTerminal => None,
            };
            tracing::warn!(key, attempts, "Polling exhausted before terminal state");
            Err(PollError::Exhausted {
                attempts,
                last_observed: last_observed.into_inner(),
                last_error,
            })
        }
    }
}
