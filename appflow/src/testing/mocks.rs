//! A scripted in-memory remote service.

use super::fixtures::{resource, upload_status};
use crate::errors::RemoteError;
use crate::models::{
    Resource, ResourceId, SubResource, SubResourceId, UploadRequest, UploadSlot, UploadState,
    UploadStatus,
};
use crate::transport::RemoteApi;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// A call received by [`ScriptedRemoteApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `fetch_resource`.
    FetchResource(ResourceId),
    /// `create_upload`.
    CreateUpload(UploadRequest),
    /// `upload_payload`.
    UploadPayload {
        /// Slot id.
        upload_id: String,
        /// Payload size.
        bytes: usize,
    },
    /// `upload_status`.
    UploadStatus(String),
    /// `list_sub_resources`.
    ListSubResources(ResourceId),
    /// `trigger`.
    Trigger(SubResourceId),
}

struct TriggerFailure {
    remaining: usize,
    error: RemoteError,
}

/// A [`RemoteApi`] that answers from a script and records every call.
///
/// By default every call succeeds: the resource exists, the slot is `u-1`,
/// the upload is already finished and there are no sub-resources. Status
/// scripts are consumed in order; once exhausted the last answer repeats.
pub struct ScriptedRemoteApi {
    resource_id: ResourceId,
    resource: Result<Resource, RemoteError>,
    slot: Result<UploadSlot, RemoteError>,
    upload_error: Option<RemoteError>,
    statuses: Mutex<VecDeque<Result<UploadStatus, RemoteError>>>,
    last_status: Mutex<Option<Result<UploadStatus, RemoteError>>>,
    sub_resources: Result<Vec<SubResource>, RemoteError>,
    trigger_failures: Mutex<HashMap<SubResourceId, TriggerFailure>>,
    trigger_delays: Mutex<HashMap<SubResourceId, Duration>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl ScriptedRemoteApi {
    /// A service where `resource_id` exists and every call succeeds.
    #[must_use]
    pub fn new(resource_id: i64) -> Self {
        Self {
            resource_id: ResourceId(resource_id),
            resource: Ok(resource(resource_id, Some(UploadState::Finished))),
            slot: Ok(UploadSlot::new("u-1")),
            upload_error: None,
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(Some(Ok(upload_status("u-1", resource_id, UploadState::Finished)))),
            sub_resources: Ok(Vec::new()),
            trigger_failures: Mutex::new(HashMap::new()),
            trigger_delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes the resource lookup fail.
    #[must_use]
    pub fn with_resource_error(mut self, error: RemoteError) -> Self {
        self.resource = Err(error);
        self
    }

    /// Makes slot creation fail.
    #[must_use]
    pub fn with_create_error(mut self, error: RemoteError) -> Self {
        self.slot = Err(error);
        self
    }

    /// Makes the payload transfer fail.
    #[must_use]
    pub fn with_upload_error(mut self, error: RemoteError) -> Self {
        self.upload_error = Some(error);
        self
    }

    /// Answers status checks with `states`, in order.
    #[must_use]
    pub fn with_poll_states(self, states: &[UploadState]) -> Self {
        let id = self.resource_id.0;
        self.with_status_results(
            states
                .iter()
                .map(|state| Ok(upload_status("u-1", id, *state)))
                .collect(),
        )
    }

    /// Answers status checks with `results`, in order.
    #[must_use]
    pub fn with_status_results(self, results: Vec<Result<UploadStatus, RemoteError>>) -> Self {
        *self.statuses.lock() = results.into();
        self
    }

    /// Sets the sub-resources returned by the listing.
    #[must_use]
    pub fn with_sub_resources(mut self, sub_resources: Vec<SubResource>) -> Self {
        self.sub_resources = Ok(sub_resources);
        self
    }

    /// Makes the listing fail.
    #[must_use]
    pub fn with_list_error(mut self, error: RemoteError) -> Self {
        self.sub_resources = Err(error);
        self
    }

    /// Fails the first `times` triggers of `id` with `error`.
    #[must_use]
    pub fn with_trigger_failures(self, id: i64, times: usize, error: RemoteError) -> Self {
        self.trigger_failures.lock().insert(
            SubResourceId(id),
            TriggerFailure {
                remaining: times,
                error,
            },
        );
        self
    }

    /// Delays every trigger of `id` by `delay`.
    #[must_use]
    pub fn with_trigger_delay(self, id: i64, delay: Duration) -> Self {
        self.trigger_delays.lock().insert(SubResourceId(id), delay);
        self
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Number of calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&RemoteCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Number of status checks received.
    #[must_use]
    pub fn status_checks(&self) -> usize {
        self.count_calls(|c| matches!(c, RemoteCall::UploadStatus(_)))
    }

    /// Number of triggers received for `id`.
    #[must_use]
    pub fn trigger_count(&self, id: i64) -> usize {
        self.count_calls(|c| *c == RemoteCall::Trigger(SubResourceId(id)))
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemoteApi {
    async fn fetch_resource(&self, id: ResourceId) -> Result<Resource, RemoteError> {
        self.record(RemoteCall::FetchResource(id));
        if id != self.resource_id {
            return Err(RemoteError::status(404, format!("resource {id} not found")));
        }
        self.resource.clone()
    }

    async fn create_upload(&self, request: &UploadRequest) -> Result<UploadSlot, RemoteError> {
        self.record(RemoteCall::CreateUpload(request.clone()));
        self.slot.clone()
    }

    async fn upload_payload(&self, slot: &UploadSlot, payload: &[u8]) -> Result<UploadSlot, RemoteError> {
        self.record(RemoteCall::UploadPayload {
            upload_id: slot.upload_id.clone(),
            bytes: payload.len(),
        });
        match &self.upload_error {
            Some(error) => Err(error.clone()),
            None => Ok(slot.clone()),
        }
    }

    async fn upload_status(&self, slot: &UploadSlot) -> Result<UploadStatus, RemoteError> {
        self.record(RemoteCall::UploadStatus(slot.upload_id.clone()));
        let mut last = self.last_status.lock();
        if let Some(next) = self.statuses.lock().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| Err(RemoteError::status(404, "no status scripted")))
    }

    async fn list_sub_resources(&self, id: ResourceId) -> Result<Vec<SubResource>, RemoteError> {
        self.record(RemoteCall::ListSubResources(id));
        self.sub_resources.clone()
    }

    async fn trigger(&self, id: SubResourceId) -> Result<(), RemoteError> {
        self.record(RemoteCall::Trigger(id));
        let delay = self.trigger_delays.lock().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut failures = self.trigger_failures.lock();
        match failures.get_mut(&id) {
            Some(failure) if failure.remaining > 0 => {
                failure.remaining -= 1;
                Err(failure.error.clone())
            }
            _ => Ok(()),
        }
    }
}
