//! reqwest implementation of [`RemoteApi`].

use super::{HttpConfig, RemoteApi, UploadProgress};
use crate::errors::RemoteError;
use crate::events::{EventSink, NoOpEventSink, WorkflowEvent};
use crate::models::{
    decode_json, Resource, ResourceId, SubResource, SubResourceId, UploadRequest, UploadSlot,
    UploadStatus,
};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{multipart, Body, Client, RequestBuilder, Response};
use std::sync::Arc;

const UPLOAD_PART: &str = "appFile";

/// HTTP client for the remote service.
pub struct HttpRemoteApi {
    client: Client,
    config: HttpConfig,
    api_key: String,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for HttpRemoteApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteApi")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpRemoteApi {
    /// Creates a client authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: HttpConfig, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
            events: Arc::new(NoOpEventSink),
        })
    }

    /// Reports upload progress to `events`.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            format!("api_key {}", self.api_key),
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::status(status.as_u16(), body))
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: &'static str,
    ) -> Result<T, RemoteError> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        decode_json(&body, expected)
    }

    fn payload_body(&self, slot: &UploadSlot, payload: &[u8]) -> Body {
        Body::wrap_stream(progress_chunks(
            self.events.clone(),
            slot.upload_id.clone(),
            payload,
            self.config.upload_chunk_size,
        ))
    }
}

/// Splits `payload` into owned chunks, reporting progress as each is taken.
fn progress_chunks(
    events: Arc<dyn EventSink>,
    upload_id: String,
    payload: &[u8],
    chunk_size: usize,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
    let total = payload.len() as u64;
    let chunks: Vec<Vec<u8>> = payload.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;

    stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        let progress = UploadProgress::new(sent, total);
        tracing::trace!(upload_id = %upload_id, "{progress}");
        events.try_emit(&WorkflowEvent::UploadProgress {
            upload_id: upload_id.clone(),
            sent: progress.sent,
            total: progress.total,
        });
        Ok(chunk)
    })
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn fetch_resource(&self, id: ResourceId) -> Result<Resource, RemoteError> {
        let url = self.config.api_url(&format!("apps/{id}"));
        self.send_json(self.client.get(url), "resource").await
    }

    async fn create_upload(&self, request: &UploadRequest) -> Result<UploadSlot, RemoteError> {
        let url = self.config.api_url(&format!("apps/{}", request.id));
        self.send_json(self.client.post(url).json(request), "upload slot")
            .await
    }

    async fn upload_payload(&self, slot: &UploadSlot, payload: &[u8]) -> Result<UploadSlot, RemoteError> {
        let url = self.config.upload_url(&format!("apps/{}", slot.upload_id));
        let part = multipart::Part::stream_with_length(self.payload_body(slot, payload), payload.len() as u64)
            .file_name(UPLOAD_PART);
        let form = multipart::Form::new().part(UPLOAD_PART, part);

        tracing::debug!(upload_id = %slot.upload_id, bytes = payload.len(), "Uploading payload");
        self.send_json(self.client.put(url).multipart(form), "upload slot")
            .await
    }

    async fn upload_status(&self, slot: &UploadSlot) -> Result<UploadStatus, RemoteError> {
        let url = self.config.api_url(&format!("apps/{}", slot.upload_id));
        self.send_json(self.client.get(url), "upload status").await
    }

    async fn list_sub_resources(&self, id: ResourceId) -> Result<Vec<SubResource>, RemoteError> {
        let url = self.config.api_url(&format!("apps/{id}/app-journeys"));
        self.send_json(self.client.get(url), "sub-resource list")
            .await
    }

    async fn trigger(&self, id: SubResourceId) -> Result<(), RemoteError> {
        let url = self.config.api_url(&format!("app-journeys/{id}/runs"));
        self.send(self.client.post(url)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::models::UploadState;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned response and returns the raw request it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v2/", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (base, handle)
    }

    fn client(base: &str) -> HttpRemoteApi {
        HttpRemoteApi::new(
            HttpConfig::new().with_api_base_url(base).with_upload_base_url(base),
            "secret",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_resource_sends_auth_and_decodes() {
        let (base, server) =
            serve_once("200 OK", r#"{"id":42,"name":"Shop","folderId":7,"uploadState":"finished"}"#).await;

        let resource = client(&base).fetch_resource(ResourceId(42)).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(resource.upload_state, Some(UploadState::Finished));
        assert!(request.starts_with("GET /v2/apps/42 HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: api_key secret"));
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_status_error() {
        let (base, server) = serve_once("404 Not Found", "no such app").await;

        let err = client(&base).fetch_resource(ResourceId(7)).await.unwrap_err();
        server.await.unwrap();

        assert_eq!(err, RemoteError::status(404, "no such app"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let (base, server) = serve_once("200 OK", r#"{"unexpected": true}"#).await;

        let err = client(&base).list_sub_resources(ResourceId(7)).await.unwrap_err();
        server.await.unwrap();

        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_trigger_posts_to_runs() {
        let (base, server) = serve_once("200 OK", "{}").await;

        client(&base).trigger(SubResourceId(1000)).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /v2/app-journeys/1000/runs HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v2/", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&base).trigger(SubResourceId(1)).await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }

    #[tokio::test]
    async fn test_progress_chunks_report_each_chunk() {
        let sink = Arc::new(CollectingEventSink::new());

        let chunks: Vec<Vec<u8>> = progress_chunks(sink.clone(), "u-1".into(), b"0123456789", 4)
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(chunks, vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);
        let sent: Vec<u64> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                WorkflowEvent::UploadProgress { sent, total: 10, .. } => Some(sent),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![4, 8, 10]);
    }

    #[tokio::test]
    async fn test_progress_chunks_are_lazy() {
        let sink = Arc::new(CollectingEventSink::new());

        let _stream = progress_chunks(sink.clone(), "u-1".into(), b"0123456789", 4);
        assert!(sink.is_empty());
    }
}
