//! # Appflow
//!
//! Uploads a new build of an existing app, waits for the remote service to
//! finish processing it, then triggers every journey linked to the app.
//!
//! The workflow is a chain of six async stages:
//!
//! - **Fetch resource**: look up the app by id
//! - **Create upload**: request an upload slot for it
//! - **Upload payload**: stream the build into the slot
//! - **Poll status**: re-check at a fixed interval until processing finishes
//! - **Fetch sub-resources**: list the app's journeys
//! - **Trigger all**: start every journey concurrently, retrying each independently
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use appflow::prelude::*;
//! use std::sync::Arc;
//!
//! let api = HttpRemoteApi::new(HttpConfig::default(), api_key)?;
//! let orchestrator = WorkflowOrchestrator::new(Arc::new(api));
//!
//! let report = orchestrator
//!     .run(WorkflowRun::new(42, payload, "Shop.ipa"))
//!     .await?;
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod events;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod transport;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancelGuard, CancellationToken};
    pub use crate::errors::{RemoteError, WorkflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, WorkflowEvent};
    pub use crate::models::{
        Resource, ResourceId, SubResource, SubResourceId, UploadSlot, UploadState, UploadStatus,
    };
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::pipeline::{fan_out_collect, poll_until_state, retry_with_delay, RetryPolicy};
    pub use crate::transport::{HttpConfig, RemoteApi};
    #[cfg(feature = "http")]
    pub use crate::transport::HttpRemoteApi;
    pub use crate::workflow::{RunReport, WorkflowConfig, WorkflowOrchestrator, WorkflowRun};
}
