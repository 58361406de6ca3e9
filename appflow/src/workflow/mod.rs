//! The upload workflow.
//!
//! [`WorkflowOrchestrator`] chains six stages over a [`RemoteApi`]:
//! fetch resource, create upload, upload payload, poll status, fetch
//! sub-resources, trigger all. It returns a [`RunReport`] or the first
//! [`WorkflowError`](crate::errors::WorkflowError).
//!
//! [`RemoteApi`]: crate::transport::RemoteApi

mod config;
mod orchestrator;
mod run;
mod stage;

#[cfg(test)]
mod integration_tests;

pub use config::{PollConfig, TriggerConfig, WorkflowConfig};
pub use orchestrator::WorkflowOrchestrator;
pub use run::{RunReport, WorkflowRun};
pub use stage::{WorkflowStage, WorkflowState};
