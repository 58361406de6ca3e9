//! Spans and timers for workflow runs.

use crate::workflow::WorkflowStage;
use tokio::time::Instant;
use tracing::Span;

/// Simple span timing helper.
///
/// Uses the tokio clock, so paused-time tests see virtual durations.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

/// Span covering one workflow run.
#[must_use]
pub fn workflow_span(run_id: &str, resource_id: i64) -> Span {
    tracing::info_span!("workflow", run_id, resource_id)
}

/// Span covering one stage of a run.
#[must_use]
pub fn stage_span(stage: WorkflowStage) -> Span {
    tracing::info_span!("stage", stage = stage.as_str())
}
