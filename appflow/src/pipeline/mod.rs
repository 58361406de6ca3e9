//! Reusable async combinators for the workflow.
//!
//! This module provides:
//! - Bounded retry with a fixed delay
//! - Polling until a terminal state
//! - Concurrent fan-out with a fail-fast join

mod fan_out;
mod poll;
mod retry;

pub use fan_out::{fan_out_collect, fan_out_collect_if, FanOutError};
pub use poll::{poll_until_state, PollError};
pub use retry::{
    retry_with_delay, retry_with_delay_if, RetryDecision, RetryPolicy, RetryState,
};
