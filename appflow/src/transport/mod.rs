//! Remote calls made by the workflow.
//!
//! [`RemoteApi`] is the seam between the orchestrator and the network. Every
//! call is a single attempt; retrying is the orchestrator's business.
//! Cancelling an in-flight call means dropping its future.

mod config;
#[cfg(feature = "http")]
mod http;
mod progress;

pub use config::HttpConfig;
#[cfg(feature = "http")]
pub use http::HttpRemoteApi;
pub use progress::UploadProgress;

use crate::errors::RemoteError;
use crate::models::{
    Resource, ResourceId, SubResource, SubResourceId, UploadRequest, UploadSlot, UploadStatus,
};
use async_trait::async_trait;

/// The remote operations the workflow depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetches a resource by id.
    async fn fetch_resource(&self, id: ResourceId) -> Result<Resource, RemoteError>;

    /// Creates an upload slot.
    async fn create_upload(&self, request: &UploadRequest) -> Result<UploadSlot, RemoteError>;

    /// Transfers the payload into a slot.
    async fn upload_payload(&self, slot: &UploadSlot, payload: &[u8]) -> Result<UploadSlot, RemoteError>;

    /// Reads the processing status of an upload.
    async fn upload_status(&self, slot: &UploadSlot) -> Result<UploadStatus, RemoteError>;

    /// Lists the sub-resources of a resource.
    async fn list_sub_resources(&self, id: ResourceId) -> Result<Vec<SubResource>, RemoteError>;

    /// Triggers one sub-resource.
    async fn trigger(&self, id: SubResourceId) -> Result<(), RemoteError>;
}
