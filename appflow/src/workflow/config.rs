//! Workflow tuning.

use crate::models::UploadState;
use crate::pipeline::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling of the upload status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// State that ends polling successfully.
    #[serde(default = "default_expected_state")]
    pub expected_state: UploadState,
    /// Re-checks allowed after the first.
    #[serde(default = "default_poll_retries")]
    pub retries: usize,
    /// Fixed delay between checks, in seconds.
    #[serde(default = "default_poll_delay")]
    pub delay_seconds: f64,
}

fn default_expected_state() -> UploadState {
    UploadState::Finished
}

fn default_poll_retries() -> usize {
    40
}

fn default_poll_delay() -> f64 {
    2.0
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            expected_state: default_expected_state(),
            retries: default_poll_retries(),
            delay_seconds: default_poll_delay(),
        }
    }
}

impl PollConfig {
    /// The retry policy for status checks.
    ///
    /// Negative or non-finite delays mean no delay; delays too large for a
    /// `Duration` saturate.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        let delay = match Duration::try_from_secs_f64(self.delay_seconds) {
            Ok(delay) => delay,
            Err(_) if self.delay_seconds.is_finite() && self.delay_seconds > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        };
        RetryPolicy::new(self.retries, delay)
    }
}

/// Triggering of sub-resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Immediate re-issues allowed per sub-resource.
    #[serde(default = "default_trigger_retries")]
    pub retries: usize,
}

fn default_trigger_retries() -> usize {
    10
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            retries: default_trigger_retries(),
        }
    }
}

impl TriggerConfig {
    /// The per-item retry policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.retries)
    }
}

/// Configuration for a [`WorkflowOrchestrator`](super::WorkflowOrchestrator).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Status polling.
    #[serde(default)]
    pub poll: PollConfig,
    /// Sub-resource triggering.
    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl WorkflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the poll retries and delay.
    #[must_use]
    pub fn with_poll(mut self, retries: usize, delay: Duration) -> Self {
        self.poll.retries = retries;
        self.poll.delay_seconds = delay.as_secs_f64();
        self
    }

    /// Sets the per-item trigger retries.
    #[must_use]
    pub fn with_trigger_retries(mut self, retries: usize) -> Self {
        self.trigger.retries = retries;
        self
    }
}
