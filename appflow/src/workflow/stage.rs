//! Workflow stages and the orchestrator's observable state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the upload workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Look up the target resource.
    FetchResource,
    /// Create an upload slot for it.
    CreateUpload,
    /// Transfer the payload.
    UploadPayload,
    /// Wait for the upload to be processed.
    PollStatus,
    /// List the resource's sub-resources.
    FetchSubResources,
    /// Trigger every sub-resource concurrently.
    TriggerAll,
}

impl WorkflowStage {
    /// All stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::FetchResource,
        Self::CreateUpload,
        Self::UploadPayload,
        Self::PollStatus,
        Self::FetchSubResources,
        Self::TriggerAll,
    ];

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchResource => "fetch_resource",
            Self::CreateUpload => "create_upload",
            Self::UploadPayload => "upload_payload",
            Self::PollStatus => "poll_status",
            Self::FetchSubResources => "fetch_sub_resources",
            Self::TriggerAll => "trigger_all",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the orchestrator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum WorkflowState {
    /// No run has started.
    #[default]
    Idle,
    /// A stage is in flight.
    Running(WorkflowStage),
    /// The last run finished successfully.
    Done,
    /// The last run failed in the given stage.
    Failed(WorkflowStage),
}

impl WorkflowState {
    /// Whether the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}
