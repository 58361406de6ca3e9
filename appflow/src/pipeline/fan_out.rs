//! Fan out independent operations and join on all-success or first failure.
//!
//! Every item runs as its own tokio task with a private retry counter and a
//! private cancellation token. All tokens descend from one group token, so the
//! first item that exhausts its retries cancels the rest.
//!
//! There is no concurrency ceiling: one task per item starts immediately.
//! Very large batches put the whole load on the remote service at once.

use super::retry::{retry_with_delay_if, RetryPolicy};
use crate::cancellation::{CancelGuard, CancellationToken};
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Why a fan-out did not produce a result for every item.
#[derive(Debug, Clone, Error)]
pub enum FanOutError<I, E> {
    /// One item exhausted its retries (or hit a non-retryable failure).
    #[error("item {item:?} failed after {attempts} attempts: {error}")]
    Failed {
        /// The failing item.
        item: I,
        /// Attempts made for it.
        attempts: usize,
        /// Its last failure.
        error: E,
    },
    /// The parent token was cancelled.
    #[error("fan-out cancelled: {reason}")]
    Cancelled {
        /// Cancellation reason.
        reason: String,
    },
    /// An item task panicked.
    #[error("fan-out task panicked: {message}")]
    Panicked {
        /// Join error text.
        message: String,
    },
}

enum ItemOutcome<R, E> {
    Done(R),
    Failed { attempts: usize, error: E },
    Cancelled,
}

/// Runs `to_operation` for every item concurrently, re-issuing each failed
/// operation immediately up to `retries` times.
pub async fn fan_out_collect<I, R, E, F, Fut>(
    items: Vec<I>,
    retries: usize,
    parent: &Arc<CancellationToken>,
    to_operation: F,
) -> Result<Vec<R>, FanOutError<I, E>>
where
    I: Clone + fmt::Debug + Send + Sync + 'static,
    R: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    fan_out_collect_if(
        items,
        RetryPolicy::immediate(retries),
        parent,
        to_operation,
        |_: &E| true,
    )
    .await
}

/// Like [`fan_out_collect`], with an explicit per-item policy and a filter
/// for failures that must not be retried.
///
/// Results come back in input order. On failure, already completed results
/// are discarded and the remaining items are cancelled and drained before
/// returning, so no item task outlives the call.
pub async fn fan_out_collect_if<I, R, E, F, Fut, P>(
    items: Vec<I>,
    policy: RetryPolicy,
    parent: &Arc<CancellationToken>,
    to_operation: F,
    is_retryable: P,
) -> Result<Vec<R>, FanOutError<I, E>>
where
    I: Clone + fmt::Debug + Send + Sync + 'static,
    R: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let group = CancellationToken::child(parent);
    let mut guard = CancelGuard::new(group.clone(), "fan-out join dropped");
    let operation = Arc::new(to_operation);
    let is_retryable = Arc::new(is_retryable);

    tracing::debug!(items = items.len(), retries = policy.retries, "Starting fan-out");

    let mut tasks = FuturesUnordered::new();
    for (index, item) in items.iter().cloned().enumerate() {
        let token = CancellationToken::child(&group);
        let operation = operation.clone();
        let is_retryable = is_retryable.clone();

        tasks.push(tokio::spawn(async move {
            let key = format!("{item:?}");
            let work = async {
                let mut attempts = 0usize;
                let result = retry_with_delay_if(
                    &policy,
                    &key,
                    || {
                        attempts += 1;
                        (*operation)(item.clone())
                    },
                    |e| (*is_retryable)(e),
                )
                .await;
                (result, attempts)
            };

            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => ItemOutcome::Cancelled,
                (result, attempts) = work => match result {
                    Ok(value) => ItemOutcome::Done(value),
                    Err(error) => ItemOutcome::Failed { attempts, error },
                },
            };
            (index, outcome)
        }));
    }

    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    let mut failure = None;

    while let Some(joined) = tasks.next().await {
        match joined {
            Ok((index, ItemOutcome::Done(value))) => results[index] = Some(value),
            Ok((index, ItemOutcome::Failed { attempts, error })) => {
                let item = items[index].clone();
                tracing::warn!(item = ?item, attempts, error = %error, "Fan-out item failed, cancelling the rest");
                group.cancel(format!("item {item:?} failed"));
                failure = Some(FanOutError::Failed {
                    item,
                    attempts,
                    error,
                });
                break;
            }
            Ok((_, ItemOutcome::Cancelled)) => {
                failure = Some(FanOutError::Cancelled {
                    reason: group.reason().unwrap_or_default(),
                });
                break;
            }
            Err(join_error) => {
                group.cancel("fan-out task panicked");
                failure = Some(FanOutError::Panicked {
                    message: join_error.to_string(),
                });
                break;
            }
        }
    }

    if let Some(error) = failure {
        // Remaining items see the cancelled token and return promptly.
        while tasks.next().await.is_some() {}
        return Err(error);
    }

    guard.disarm();
    Ok(results.into_iter().flatten().collect())
}
