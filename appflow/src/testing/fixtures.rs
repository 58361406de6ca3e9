//! Wire-value fixtures.

use crate::models::{Resource, ResourceId, SubResource, UploadState, UploadStatus};

/// A resource with the given id and upload state.
#[must_use]
pub fn resource(id: i64, state: Option<UploadState>) -> Resource {
    Resource {
        id: ResourceId(id),
        name: format!("App {id}"),
        folder_id: 1,
        upload_state: state,
    }
}

/// An upload status embedding `resource_id` in `state`.
#[must_use]
pub fn upload_status(upload_id: &str, resource_id: i64, state: UploadState) -> UploadStatus {
    UploadStatus {
        upload_id: upload_id.to_string(),
        resource: Some(resource(resource_id, Some(state))),
    }
}

/// Sub-resources from `(id, name)` pairs.
#[must_use]
pub fn sub_resources(pairs: &[(i64, &str)]) -> Vec<SubResource> {
    pairs.iter().map(|(id, name)| SubResource::new(*id, *name)).collect()
}
