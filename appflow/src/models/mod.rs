//! Wire models exchanged with the remote service.
//!
//! The orchestrator only ever holds immutable snapshots of these values.

mod resource;
mod sub_resource;
mod upload;

pub use resource::{Resource, ResourceId, UploadState};
pub use sub_resource::{SubResource, SubResourceId};
pub use upload::{Platform, UploadRequest, UploadSlot, UploadStatus};

use crate::errors::RemoteError;
use serde::de::DeserializeOwned;

/// Decodes a JSON response body into `T`.
///
/// `expected` names the shape in the resulting [`RemoteError::Decode`].
pub fn decode_json<T: DeserializeOwned>(body: &[u8], expected: &'static str) -> Result<T, RemoteError> {
    serde_json::from_slice(body).map_err(|e| RemoteError::decode(expected, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_resource() {
        let body = br#"{
            "id": 231,
            "name": "Shop",
            "folderId": 17,
            "uploadState": "finished"
        }"#;

        let resource: Resource = decode_json(body, "resource").unwrap();
        assert_eq!(
            resource,
            Resource {
                id: ResourceId(231),
                name: "Shop".into(),
                folder_id: 17,
                upload_state: Some(UploadState::Finished),
            }
        );
    }

    #[test]
    fn test_decode_resource_without_state() {
        let body = br#"{"id": 1, "name": "Shop", "folderId": 2}"#;

        let resource: Resource = tokio_test::assert_ok!(decode_json(body, "resource"));
        assert_eq!(resource.upload_state, None);
    }

    #[test]
    fn test_decode_upload_status() {
        let body = br#"{
            "uploadId": "5e0c1f6a",
            "app": {
                "id": 231,
                "name": "Shop",
                "folderId": 17,
                "uploadState": "updating"
            }
        }"#;

        let status: UploadStatus = decode_json(body, "upload status").unwrap();
        assert_eq!(status.upload_id, "5e0c1f6a");
        assert_eq!(status.state(), Some(UploadState::Updating));
    }

    #[test]
    fn test_decode_upload_status_without_resource() {
        let body = br#"{"uploadId": "5e0c1f6a"}"#;

        let status: UploadStatus = decode_json(body, "upload status").unwrap();
        assert!(status.resource.is_none());
        assert_eq!(status.state(), None);
    }

    #[test]
    fn test_decode_sub_resources() {
        let body = br#"[{"id": 1000, "name": "J1"}, {"id": 2000, "name": "J2"}]"#;

        let journeys: Vec<SubResource> = decode_json(body, "sub-resource list").unwrap();
        assert_eq!(
            journeys,
            vec![SubResource::new(1000, "J1"), SubResource::new(2000, "J2")]
        );
    }

    #[test]
    fn test_decode_failure_names_expected_shape() {
        let err = decode_json::<Resource>(b"<html>", "resource").unwrap_err();

        assert!(err.is_decode());
        assert!(err.to_string().starts_with("could not decode resource response"));
    }

    #[test]
    fn test_decode_unknown_upload_state() {
        let body = br#"{"id": 1, "name": "Shop", "folderId": 2, "uploadState": "exploded"}"#;

        tokio_test::assert_err!(decode_json::<Resource>(body, "resource"));
    }
}
