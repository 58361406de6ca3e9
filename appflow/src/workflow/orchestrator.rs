//! Runs the six workflow stages in order and reports one terminal outcome.

use super::{RunReport, WorkflowConfig, WorkflowRun, WorkflowStage, WorkflowState};
use crate::cancellation::CancellationToken;
use crate::errors::{RemoteError, WorkflowError};
use crate::events::{EventSink, NoOpEventSink, WorkflowEvent};
use crate::models::{ResourceId, SubResource, UploadRequest, UploadSlot, UploadStatus};
use crate::observability::{stage_span, workflow_span, SpanTimer};
use crate::pipeline::{fan_out_collect_if, poll_until_state, FanOutError, PollError};
use crate::transport::RemoteApi;
use chrono::Utc;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Drives a [`WorkflowRun`] through every stage.
///
/// Stages run strictly one after another; only the final stage fans out.
/// Any failure ends the run. Cancelling the orchestrator fails whatever stage
/// is in flight, and every later run fails immediately.
pub struct WorkflowOrchestrator {
    api: Arc<dyn RemoteApi>,
    config: WorkflowConfig,
    events: Arc<dyn EventSink>,
    token: Arc<CancellationToken>,
    state: RwLock<WorkflowState>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl WorkflowOrchestrator {
    /// Creates an orchestrator with default configuration.
    #[must_use]
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            api,
            config: WorkflowConfig::default(),
            events: Arc::new(NoOpEventSink),
            token: Arc::new(CancellationToken::new()),
            state: RwLock::new(WorkflowState::Idle),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        *self.state.read()
    }

    /// Cancels the stage in flight and any later run.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// The orchestrator's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.token.clone()
    }

    /// Executes one run from the first stage to the last.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that failed.
    pub async fn run(&self, run: WorkflowRun) -> Result<RunReport, WorkflowError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = SpanTimer::start("workflow");

        tracing::info!(
            %run_id,
            resource_id = %run.resource_id,
            payload_bytes = run.payload.len(),
            "Starting workflow run"
        );
        self.events
            .emit(&WorkflowEvent::RunStarted {
                run_id,
                resource_id: run.resource_id,
            })
            .await;

        let result = self
            .execute(run_id, &run)
            .instrument(workflow_span(&run_id.to_string(), run.resource_id.0))
            .await;

        let report = match result {
            Ok((upload_id, triggered)) => {
                *self.state.write() = WorkflowState::Done;
                tracing::info!(%run_id, triggered = triggered.len(), "Workflow run succeeded");
                Ok(RunReport {
                    run_id,
                    resource_id: run.resource_id,
                    display_name: run.display_name.clone(),
                    upload_id,
                    triggered,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::error!(%run_id, kind = e.kind(), stage = %e.stage(), error = %e, "Workflow run failed");
                Err(e)
            }
        };

        self.events
            .emit(&WorkflowEvent::RunFinished {
                run_id,
                succeeded: report.is_ok(),
                duration_ms: timer.finish(),
            })
            .await;
        report
    }

    async fn execute(
        &self,
        run_id: Uuid,
        run: &WorkflowRun,
    ) -> Result<(String, Vec<SubResource>), WorkflowError> {
        let resource_id = run.resource_id;

        let resource = self
            .run_stage(run_id, WorkflowStage::FetchResource, async {
                self.api.fetch_resource(resource_id).await.map_err(|e| {
                    WorkflowError::from_remote(
                        WorkflowStage::FetchResource,
                        format!("resource {resource_id}"),
                        e,
                        |source| WorkflowError::LookupFailed { resource_id, source },
                    )
                })
            })
            .await?;

        let request = UploadRequest::for_resource(&resource, run.display_name.clone());
        let slot = self
            .run_stage(run_id, WorkflowStage::CreateUpload, async {
                self.api.create_upload(&request).await.map_err(|e| {
                    WorkflowError::from_remote(
                        WorkflowStage::CreateUpload,
                        format!("upload slot for resource {resource_id}"),
                        e,
                        |source| WorkflowError::CreateFailed { resource_id, source },
                    )
                })
            })
            .await?;

        let slot = self
            .run_stage(run_id, WorkflowStage::UploadPayload, async {
                self.api
                    .upload_payload(&slot, &run.payload)
                    .await
                    .map_err(|e| {
                        WorkflowError::from_remote(
                            WorkflowStage::UploadPayload,
                            format!("upload {}", slot.upload_id),
                            e,
                            |source| WorkflowError::UploadFailed {
                                upload_id: slot.upload_id.clone(),
                                source,
                            },
                        )
                    })
            })
            .await?;

        self.run_stage(run_id, WorkflowStage::PollStatus, self.poll_status(&slot))
            .await?;

        let sub_resources = self
            .run_stage(run_id, WorkflowStage::FetchSubResources, async {
                self.api.list_sub_resources(resource_id).await.map_err(|e| {
                    WorkflowError::from_remote(
                        WorkflowStage::FetchSubResources,
                        format!("sub-resources of resource {resource_id}"),
                        e,
                        |source| WorkflowError::ListFailed { resource_id, source },
                    )
                })
            })
            .await?;

        let triggered = self
            .run_stage(
                run_id,
                WorkflowStage::TriggerAll,
                self.trigger_all(resource_id, sub_resources),
            )
            .await?;

        Ok((slot.upload_id, triggered))
    }

    /// Runs one stage, racing it against cancellation.
    async fn run_stage<T, Fut>(
        &self,
        run_id: Uuid,
        stage: WorkflowStage,
        work: Fut,
    ) -> Result<T, WorkflowError>
    where
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        *self.state.write() = WorkflowState::Running(stage);
        self.events
            .emit(&WorkflowEvent::StageStarted { run_id, stage })
            .await;
        let timer = SpanTimer::start(stage.as_str());

        let result = tokio::select! {
            biased;
            () = self.token.cancelled() => Err(WorkflowError::Cancelled {
                stage,
                reason: self.token.reason().unwrap_or_else(|| "cancelled".to_string()),
            }),
            result = work.instrument(stage_span(stage)) => result,
        };

        match &result {
            Ok(_) => {
                let duration_ms = timer.finish();
                tracing::debug!(%stage, duration_ms, "Stage completed");
                self.events
                    .emit(&WorkflowEvent::StageCompleted {
                        run_id,
                        stage,
                        duration_ms,
                    })
                    .await;
            }
            Err(e) => {
                *self.state.write() = WorkflowState::Failed(stage);
                self.events
                    .emit(&WorkflowEvent::StageFailed {
                        run_id,
                        stage,
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }
        result
    }

    async fn poll_status(&self, slot: &UploadSlot) -> Result<UploadStatus, WorkflowError> {
        let expected = self.config.poll.expected_state;
        let policy = self.config.poll.policy();
        let api = &self.api;
        let events = &self.events;
        let mut attempt = 0usize;

        let result = poll_until_state(
            &policy,
            &slot.upload_id,
            || {
                attempt += 1;
                let attempt = attempt;
                async move {
                    let status = api.upload_status(slot).await;
                    match &status {
                        Ok(snapshot) => {
                            events
                                .emit(&WorkflowEvent::PollAttempt {
                                    upload_id: slot.upload_id.clone(),
                                    attempt,
                                    observed: snapshot.state(),
                                })
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                upload_id = %slot.upload_id,
                                attempt,
                                error = %e,
                                "Status check failed, will retry if budget remains"
                            );
                        }
                    }
                    status
                }
            },
            |status: &UploadStatus| status.state() == Some(expected),
            RemoteError::is_retryable,
        )
        .await;

        result.map_err(|e| match e {
            PollError::Exhausted {
                attempts,
                last_observed,
                last_error,
            } => WorkflowError::StatusMismatch {
                upload_id: slot.upload_id.clone(),
                expected,
                actual: last_observed.and_then(|status| status.state()),
                attempts,
                last_error,
            },
            PollError::Fatal(error) => WorkflowError::from_remote(
                WorkflowStage::PollStatus,
                format!("status of upload {}", slot.upload_id),
                error,
                |source| WorkflowError::StatusMismatch {
                    upload_id: slot.upload_id.clone(),
                    expected,
                    actual: None,
                    attempts: attempt,
                    last_error: Some(source),
                },
            ),
        })
    }

    async fn trigger_all(
        &self,
        resource_id: ResourceId,
        sub_resources: Vec<SubResource>,
    ) -> Result<Vec<SubResource>, WorkflowError> {
        if sub_resources.is_empty() {
            tracing::info!(%resource_id, "No sub-resources to trigger");
        }

        let api = self.api.clone();
        let events = self.events.clone();
        let result = fan_out_collect_if(
            sub_resources,
            self.config.trigger.policy(),
            &self.token,
            move |sub: SubResource| {
                let api = api.clone();
                let events = events.clone();
                async move {
                    api.trigger(sub.id).await?;
                    events
                        .emit(&WorkflowEvent::SubResourceTriggered {
                            sub_resource_id: sub.id,
                            name: sub.name.clone(),
                        })
                        .await;
                    Ok::<_, RemoteError>(sub)
                }
            },
            RemoteError::is_retryable,
        )
        .await;

        result.map_err(|e| match e {
            FanOutError::Failed {
                item,
                attempts,
                error,
            } => {
                let subject = format!("trigger of sub-resource {}", item.id);
                WorkflowError::from_remote(WorkflowStage::TriggerAll, subject, error, |source| {
                    WorkflowError::TriggerFailed {
                        sub_resource_id: item.id,
                        name: item.name,
                        attempts,
                        source,
                    }
                })
            }
            FanOutError::Cancelled { reason } => WorkflowError::Cancelled {
                stage: WorkflowStage::TriggerAll,
                reason,
            },
            FanOutError::Panicked { message } => WorkflowError::Cancelled {
                stage: WorkflowStage::TriggerAll,
                reason: format!("trigger task panicked: {message}"),
            },
        })
    }
}
