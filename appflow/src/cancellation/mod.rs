//! Structured cancellation utilities.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation
//! - CancelGuard to cancel spawned work when its joiner goes away

mod token;

pub use token::{CancelCallback, CancelGuard, CancellationToken};
