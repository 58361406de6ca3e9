//! Inputs and outputs of one workflow run.

use crate::models::{ResourceId, SubResource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What to upload, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    /// Target resource.
    pub resource_id: ResourceId,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// File name reported for the payload.
    pub display_name: String,
}

impl WorkflowRun {
    /// Creates a run description.
    #[must_use]
    pub fn new(resource_id: impl Into<ResourceId>, payload: Vec<u8>, display_name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            payload,
            display_name: display_name.into(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id.
    pub run_id: Uuid,
    /// Target resource.
    pub resource_id: ResourceId,
    /// File name of the uploaded payload.
    pub display_name: String,
    /// Upload slot that was used.
    pub upload_id: String,
    /// Sub-resources that were triggered, in listing order.
    pub triggered: Vec<SubResource>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Names of the triggered sub-resources.
    #[must_use]
    pub fn triggered_names(&self) -> Vec<&str> {
        self.triggered.iter().map(|s| s.name.as_str()).collect()
    }

    /// Human-readable outcome.
    #[must_use]
    pub fn summary(&self) -> String {
        let names = if self.triggered.is_empty() {
            "No sub-resources found for resource".to_string()
        } else {
            self.triggered_names().join(", ")
        };
        format!(
            "Successfully uploaded {} and triggered sub-resources:\n{names}",
            self.display_name
        )
    }
}
