//! Testing utilities for workflows.
//!
//! This module provides:
//! - A scripted in-memory [`RemoteApi`](crate::transport::RemoteApi)
//! - Fixtures for common wire values
//! - Assertions on run outcomes

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_failed_with, assert_triggered};
pub use fixtures::{resource, sub_resources, upload_status};
pub use mocks::{RemoteCall, ScriptedRemoteApi};
