//! Workflow events for observability.
//!
//! The orchestrator reports progress as [`WorkflowEvent`]s through an
//! [`EventSink`]. Events are advisory: sinks never influence the run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::models::{ResourceId, SubResourceId, UploadState};
use crate::workflow::WorkflowStage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something that happened during a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A run began.
    RunStarted {
        /// Run id.
        run_id: Uuid,
        /// Target resource.
        resource_id: ResourceId,
    },
    /// A stage began.
    StageStarted {
        /// Run id.
        run_id: Uuid,
        /// The stage.
        stage: WorkflowStage,
    },
    /// A stage completed.
    StageCompleted {
        /// Run id.
        run_id: Uuid,
        /// The stage.
        stage: WorkflowStage,
        /// Wall time spent in the stage.
        duration_ms: f64,
    },
    /// A stage failed; the run ends.
    StageFailed {
        /// Run id.
        run_id: Uuid,
        /// The stage.
        stage: WorkflowStage,
        /// Error kind.
        kind: String,
        /// Rendered error.
        error: String,
    },
    /// One status check of the upload returned.
    PollAttempt {
        /// Upload id.
        upload_id: String,
        /// 1-based attempt number.
        attempt: usize,
        /// State reported by the remote service.
        observed: Option<UploadState>,
    },
    /// Part of the payload was sent.
    UploadProgress {
        /// Upload id.
        upload_id: String,
        /// Bytes sent so far.
        sent: u64,
        /// Payload size.
        total: u64,
    },
    /// A sub-resource was triggered.
    SubResourceTriggered {
        /// Sub-resource id.
        sub_resource_id: SubResourceId,
        /// Its name.
        name: String,
    },
    /// A run ended.
    RunFinished {
        /// Run id.
        run_id: Uuid,
        /// Whether the run succeeded.
        succeeded: bool,
        /// Wall time of the run.
        duration_ms: f64,
    },
}

impl WorkflowEvent {
    /// Dotted event type, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::PollAttempt { .. } => "upload.poll_attempt",
            Self::UploadProgress { .. } => "upload.progress",
            Self::SubResourceTriggered { .. } => "sub_resource.triggered",
            Self::RunFinished { .. } => "run.finished",
        }
    }

    /// The event as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
