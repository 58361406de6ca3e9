//! Error types for the appflow workflow.
//!
//! Two layers are kept apart: [`RemoteError`] describes why a single remote
//! call failed, and [`WorkflowError`] is the terminal outcome of a run, tagged
//! with the stage that produced it and the ids needed to diagnose it.

use crate::models::{ResourceId, SubResourceId, UploadState};
use crate::workflow::WorkflowStage;
use std::collections::HashMap;
use thiserror::Error;

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The remote service answered with a non-success status.
    #[error("remote service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("could not decode {expected} response: {message}")]
    Decode {
        /// Name of the shape that was expected.
        expected: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The call was abandoned before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl RemoteError {
    /// Creates a decode error.
    #[must_use]
    pub fn decode(expected: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            expected,
            message: message.into(),
        }
    }

    /// Creates a status error.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether issuing the same call again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Decode { .. } | Self::Cancelled)
    }

    /// Whether this is a decode failure.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Terminal error of a workflow run.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// The resource could not be fetched or does not exist.
    #[error("Retrieving resource with id {resource_id} failed. (Underlying error: {source})")]
    LookupFailed {
        /// The requested resource.
        resource_id: ResourceId,
        /// Underlying failure.
        #[source]
        source: RemoteError,
    },

    /// The remote service rejected the upload slot.
    #[error("Creating upload for resource {resource_id} failed. (Underlying error: {source})")]
    CreateFailed {
        /// The resource the slot was requested for.
        resource_id: ResourceId,
        /// Underlying failure.
        #[source]
        source: RemoteError,
    },

    /// The payload transfer failed.
    #[error("Uploading payload to upload {upload_id} failed. (Underlying error: {source})")]
    UploadFailed {
        /// The upload slot.
        upload_id: String,
        /// Underlying failure.
        #[source]
        source: RemoteError,
    },

    /// Polling gave up before the upload reached the expected state.
    #[error(
        "Upload {upload_id} never reached state {expected} after {attempts} attempts, last observed state = {}{}",
        display_state(*actual),
        display_cause(last_error.as_ref())
    )]
    StatusMismatch {
        /// The upload slot.
        upload_id: String,
        /// State that was waited for.
        expected: UploadState,
        /// Last state reported by the remote service.
        actual: Option<UploadState>,
        /// Number of status checks issued.
        attempts: usize,
        /// Transport failure of the final attempt, if it failed.
        last_error: Option<RemoteError>,
    },

    /// The sub-resources of the resource could not be listed.
    #[error("Retrieving sub-resources for resource {resource_id} failed. (Underlying error: {source})")]
    ListFailed {
        /// The parent resource.
        resource_id: ResourceId,
        /// Underlying failure.
        #[source]
        source: RemoteError,
    },

    /// At least one sub-resource trigger exhausted its retries.
    #[error(
        "Triggering sub-resource {sub_resource_id} ({name}) failed after {attempts} attempts. (Underlying error: {source})"
    )]
    TriggerFailed {
        /// The failing sub-resource.
        sub_resource_id: SubResourceId,
        /// Its display name.
        name: String,
        /// Attempts made for it.
        attempts: usize,
        /// Last failure.
        #[source]
        source: RemoteError,
    },

    /// A response could not be decoded.
    #[error("Decoding the response for {subject} during {stage} failed. (Underlying error: {source})")]
    DecodeFailed {
        /// Stage that issued the call.
        stage: WorkflowStage,
        /// What was being fetched.
        subject: String,
        /// The decode failure.
        #[source]
        source: RemoteError,
    },

    /// The run was cancelled by its caller.
    #[error("Workflow cancelled during {stage}: {reason}")]
    Cancelled {
        /// Stage in flight when cancellation arrived.
        stage: WorkflowStage,
        /// Cancellation reason.
        reason: String,
    },
}

fn display_state(state: Option<UploadState>) -> String {
    state.map_or_else(|| "none".to_string(), |s| s.to_string())
}

fn display_cause(error: Option<&RemoteError>) -> String {
    error.map_or_else(String::new, |e| format!(" (last error: {e})"))
}

impl WorkflowError {
    /// Wraps a remote failure raised in `stage`.
    ///
    /// Decode and cancellation failures keep their own kinds; everything else
    /// goes through `wrap` into the stage-specific kind.
    pub(crate) fn from_remote(
        stage: WorkflowStage,
        subject: impl Into<String>,
        error: RemoteError,
        wrap: impl FnOnce(RemoteError) -> Self,
    ) -> Self {
        match error {
            RemoteError::Decode { .. } => Self::DecodeFailed {
                stage,
                subject: subject.into(),
                source: error,
            },
            RemoteError::Cancelled => Self::Cancelled {
                stage,
                reason: "remote call cancelled".to_string(),
            },
            other => wrap(other),
        }
    }

    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LookupFailed { .. } => "lookup_failed",
            Self::CreateFailed { .. } => "create_failed",
            Self::UploadFailed { .. } => "upload_failed",
            Self::StatusMismatch { .. } => "status_mismatch",
            Self::ListFailed { .. } => "list_failed",
            Self::TriggerFailed { .. } => "trigger_failed",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// The stage the error was raised in.
    #[must_use]
    pub fn stage(&self) -> WorkflowStage {
        match self {
            Self::LookupFailed { .. } => WorkflowStage::FetchResource,
            Self::CreateFailed { .. } => WorkflowStage::CreateUpload,
            Self::UploadFailed { .. } => WorkflowStage::UploadPayload,
            Self::StatusMismatch { .. } => WorkflowStage::PollStatus,
            Self::ListFailed { .. } => WorkflowStage::FetchSubResources,
            Self::TriggerFailed { .. } => WorkflowStage::TriggerAll,
            Self::DecodeFailed { stage, .. } | Self::Cancelled { stage, .. } => *stage,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("stage".to_string(), serde_json::json!(self.stage().as_str()));

        match self {
            Self::LookupFailed { resource_id, source }
            | Self::CreateFailed { resource_id, source }
            | Self::ListFailed { resource_id, source } => {
                map.insert("resource_id".to_string(), serde_json::json!(resource_id));
                map.insert("cause".to_string(), serde_json::json!(source.to_string()));
            }
            Self::UploadFailed { upload_id, source } => {
                map.insert("upload_id".to_string(), serde_json::json!(upload_id));
                map.insert("cause".to_string(), serde_json::json!(source.to_string()));
            }
            Self::StatusMismatch {
                upload_id,
                expected,
                actual,
                attempts,
                last_error,
            } => {
                map.insert("upload_id".to_string(), serde_json::json!(upload_id));
                map.insert("expected".to_string(), serde_json::json!(expected));
                map.insert("actual".to_string(), serde_json::json!(actual));
                map.insert("attempts".to_string(), serde_json::json!(attempts));
                if let Some(e) = last_error {
                    map.insert("cause".to_string(), serde_json::json!(e.to_string()));
                }
            }
            Self::TriggerFailed {
                sub_resource_id,
                name,
                attempts,
                source,
            } => {
                map.insert("sub_resource_id".to_string(), serde_json::json!(sub_resource_id));
                map.insert("name".to_string(), serde_json::json!(name));
                map.insert("attempts".to_string(), serde_json::json!(attempts));
                map.insert("cause".to_string(), serde_json::json!(source.to_string()));
            }
            Self::DecodeFailed { subject, source, .. } => {
                map.insert("subject".to_string(), serde_json::json!(subject));
                map.insert("cause".to_string(), serde_json::json!(source.to_string()));
            }
            Self::Cancelled { reason, .. } => {
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}
