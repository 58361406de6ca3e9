//! Upload slot lifecycle: request, slot, status.

use super::{Resource, ResourceId, UploadState};
use serde::{Deserialize, Serialize};

/// Target platform of the uploaded build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    /// Apple iOS.
    #[default]
    #[serde(rename = "iOS")]
    Ios,
}

/// Body sent to create an upload slot for an existing resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// The resource the slot is for.
    pub id: ResourceId,
    /// Resource name, echoed back.
    pub name: String,
    /// Display name of the payload file.
    pub file: String,
    /// Build platform.
    pub platform: Platform,
    /// Containing folder, echoed back.
    pub folder_id: i64,
    /// Notification recipients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
}

impl UploadRequest {
    /// Builds the request from a fetched resource and the payload's file name.
    #[must_use]
    pub fn for_resource(resource: &Resource, file_name: impl Into<String>) -> Self {
        Self {
            id: resource.id,
            name: resource.name.clone(),
            file: file_name.into(),
            platform: Platform::Ios,
            folder_id: resource.folder_id,
            recipients: None,
        }
    }
}

/// An upload slot created for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    /// Opaque upload id.
    pub upload_id: String,
}

impl UploadSlot {
    /// Creates a slot handle.
    #[must_use]
    pub fn new(upload_id: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
        }
    }
}

/// Snapshot of an upload's processing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    /// Upload id.
    pub upload_id: String,
    /// The resource with its current upload state.
    #[serde(default, rename = "app", skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

impl UploadStatus {
    /// The reported upload state, if any.
    #[must_use]
    pub fn state(&self) -> Option<UploadState> {
        self.resource.as_ref().and_then(|r| r.upload_state)
    }
}
