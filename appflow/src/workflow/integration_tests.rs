//! End-to-end runs against the scripted remote service.

use super::*;
use crate::errors::{RemoteError, WorkflowError};
use crate::events::{CollectingEventSink, WorkflowEvent};
use crate::models::{ResourceId, SubResourceId, UploadState};
use crate::testing::{
    assert_failed_with, assert_triggered, sub_resources, upload_status, RemoteCall,
    ScriptedRemoteApi,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use UploadState::{Finished, Updating};

fn journeys() -> Vec<crate::models::SubResource> {
    sub_resources(&[(1000, "J1"), (2000, "J2")])
}

fn run_42() -> WorkflowRun {
    WorkflowRun::new(42, vec![0u8; 1024], "Shop.ipa")
}

#[tokio::test(start_paused = true)]
async fn test_successful_run_triggers_every_sub_resource() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_poll_states(&[Updating, Updating, Finished])
            .with_sub_resources(journeys()),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());
    let start = Instant::now();

    let result = orchestrator.run(run_42()).await;

    assert_triggered(&result, &["J1", "J2"]);
    let report = result.unwrap();
    assert_eq!(report.upload_id, "u-1");
    assert_eq!(report.resource_id, ResourceId(42));
    assert_eq!(orchestrator.state(), WorkflowState::Done);

    // Two delays between three status checks.
    assert_eq!(api.status_checks(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!(api.trigger_count(1000), 1);
    assert_eq!(api.trigger_count(2000), 1);

    let calls = api.calls();
    assert_eq!(calls[0], RemoteCall::FetchResource(ResourceId(42)));
    assert!(matches!(&calls[1], RemoteCall::CreateUpload(request) if request.file == "Shop.ipa"));
    assert_eq!(
        calls[2],
        RemoteCall::UploadPayload {
            upload_id: "u-1".into(),
            bytes: 1024
        }
    );
    assert_eq!(calls[6], RemoteCall::ListSubResources(ResourceId(42)));
}

#[tokio::test(start_paused = true)]
async fn test_upload_that_never_finishes_is_a_status_mismatch() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_poll_states(&[Updating])
            .with_sub_resources(journeys()),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());
    let start = Instant::now();

    let err = assert_failed_with(orchestrator.run(run_42()).await, "status_mismatch");

    match err {
        WorkflowError::StatusMismatch {
            upload_id,
            expected,
            actual,
            attempts,
            last_error,
        } => {
            assert_eq!(upload_id, "u-1");
            assert_eq!(expected, Finished);
            assert_eq!(actual, Some(Updating));
            assert_eq!(attempts, 41);
            assert!(last_error.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.status_checks(), 41);
    assert_eq!(start.elapsed(), Duration::from_secs(80));
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::ListSubResources(_))), 0);
    assert_eq!(orchestrator.state(), WorkflowState::Failed(WorkflowStage::PollStatus));
}

#[tokio::test(start_paused = true)]
async fn test_no_sub_resources_is_a_success() {
    let api = Arc::new(ScriptedRemoteApi::new(42));
    let orchestrator = WorkflowOrchestrator::new(api.clone());

    let result = orchestrator.run(run_42()).await;

    assert_triggered(&result, &[]);
    assert!(result.unwrap().summary().ends_with("No sub-resources found for resource"));
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::Trigger(_))), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_status_failures_use_the_poll_budget() {
    let api = Arc::new(ScriptedRemoteApi::new(42).with_status_results(vec![
        Err(RemoteError::Transport("timed out".into())),
        Ok(upload_status("u-1", 42, Updating)),
        Err(RemoteError::status(502, "bad gateway")),
        Ok(upload_status("u-1", 42, Finished)),
    ]));
    let orchestrator = WorkflowOrchestrator::new(api.clone());
    let start = Instant::now();

    assert!(orchestrator.run(run_42()).await.is_ok());
    assert_eq!(api.status_checks(), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_status_fails_without_retry() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_status_results(vec![Err(RemoteError::decode("upload status", "missing uploadId"))]),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());

    let err = assert_failed_with(orchestrator.run(run_42()).await, "decode_failed");

    assert_eq!(err.stage(), WorkflowStage::PollStatus);
    assert_eq!(api.status_checks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_retries_are_per_item() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_sub_resources(journeys())
            .with_trigger_failures(2000, 3, RemoteError::status(503, "busy")),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());

    let result = orchestrator.run(run_42()).await;

    assert_triggered(&result, &["J1", "J2"]);
    assert_eq!(api.trigger_count(1000), 1);
    assert_eq!(api.trigger_count(2000), 4);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_trigger_fails_the_run() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_sub_resources(journeys())
            .with_trigger_failures(2000, usize::MAX, RemoteError::status(500, "boom")),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());

    let err = assert_failed_with(orchestrator.run(run_42()).await, "trigger_failed");

    match err {
        WorkflowError::TriggerFailed {
            sub_resource_id,
            name,
            attempts,
            source,
        } => {
            assert_eq!(sub_resource_id, SubResourceId(2000));
            assert_eq!(name, "J2");
            assert_eq!(attempts, 11);
            assert_eq!(source, RemoteError::status(500, "boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.trigger_count(2000), 11);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trigger_cancels_slow_siblings() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_sub_resources(sub_resources(&[(1000, "J1"), (2000, "J2"), (3000, "J3")]))
            .with_trigger_delay(1000, Duration::from_secs(60))
            .with_trigger_delay(2000, Duration::from_secs(60))
            .with_trigger_failures(3000, usize::MAX, RemoteError::status(500, "boom")),
    );
    let events = Arc::new(CollectingEventSink::new());
    let orchestrator = WorkflowOrchestrator::new(api.clone())
        .with_config(WorkflowConfig::new().with_trigger_retries(2))
        .with_event_sink(events.clone());
    let start = Instant::now();

    let err = orchestrator.run(run_42()).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::TriggerFailed { sub_resource_id: SubResourceId(3000), attempts: 3, .. }
    ));
    assert!(start.elapsed() < Duration::from_secs(60));

    // The slow siblings never complete, even once their delay has passed.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(events.events_of_type("sub_resource.").is_empty());
    assert_eq!(api.trigger_count(1000), 1);
    assert_eq!(api.trigger_count(2000), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_poll_fails_the_stage() {
    let api = Arc::new(ScriptedRemoteApi::new(42).with_poll_states(&[Updating]));
    let orchestrator = Arc::new(WorkflowOrchestrator::new(api.clone()));

    let token = orchestrator.cancel_token();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel("user interrupt");
    });

    let err = orchestrator.run(run_42()).await.unwrap_err();
    canceller.await.unwrap();

    match err {
        WorkflowError::Cancelled { stage, reason } => {
            assert_eq!(stage, WorkflowStage::PollStatus);
            assert_eq!(reason, "user interrupt");
        }
        other => panic!("unexpected error: {other}"),
    }
    let checks = api.status_checks();
    assert!((3..=4).contains(&checks));

    // No resumption: a second run stops before its first call.
    let again = orchestrator.run(run_42()).await.unwrap_err();
    assert_eq!(again.stage(), WorkflowStage::FetchResource);
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::FetchResource(_))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_follow_stage_order() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_poll_states(&[Updating, Finished])
            .with_sub_resources(journeys()),
    );
    let events = Arc::new(CollectingEventSink::new());
    let orchestrator = WorkflowOrchestrator::new(api).with_event_sink(events.clone());

    orchestrator.run(run_42()).await.unwrap();

    let started: Vec<WorkflowStage> = events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            WorkflowEvent::StageStarted { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(started, WorkflowStage::ALL.to_vec());

    let types = events.event_types();
    assert_eq!(types.first(), Some(&"run.started"));
    assert_eq!(types.last(), Some(&"run.finished"));
    assert_eq!(events.events_of_type("upload.poll_attempt").len(), 2);
    assert_eq!(events.events_of_type("sub_resource.triggered").len(), 2);
    assert!(events.events_of_type("stage.failed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_listing_failure_triggers_nothing() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_sub_resources(journeys())
            .with_list_error(RemoteError::status(500, "internal error")),
    );
    let events = Arc::new(CollectingEventSink::new());
    let orchestrator = WorkflowOrchestrator::new(api.clone()).with_event_sink(events.clone());

    let err = assert_failed_with(orchestrator.run(run_42()).await, "list_failed");

    match err {
        WorkflowError::ListFailed { resource_id, source } => {
            assert_eq!(resource_id, ResourceId(42));
            assert!(matches!(source, RemoteError::Status { status: 500, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::ListSubResources(_))), 1);
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::Trigger(_))), 0);
    assert_eq!(orchestrator.state(), WorkflowState::Failed(WorkflowStage::FetchSubResources));
    assert_eq!(events.events_of_type("stage.failed").len(), 1);
    assert!(events.events_of_type("sub_resource.triggered").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lookup_failure_issues_no_further_calls() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42).with_resource_error(RemoteError::Transport("connection refused".into())),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());

    let err = assert_failed_with(orchestrator.run(run_42()).await, "lookup_failed");

    assert_eq!(err.stage(), WorkflowStage::FetchResource);
    assert_eq!(api.calls(), vec![RemoteCall::FetchResource(ResourceId(42))]);
}

#[tokio::test(start_paused = true)]
async fn test_create_failure_skips_the_upload() {
    let api = Arc::new(ScriptedRemoteApi::new(42).with_create_error(RemoteError::status(403, "forbidden")));
    let orchestrator = WorkflowOrchestrator::new(api.clone());

    let err = assert_failed_with(orchestrator.run(run_42()).await, "create_failed");

    assert_eq!(err.stage(), WorkflowStage::CreateUpload);
    assert_eq!(api.calls().len(), 2);
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::UploadPayload { .. })), 0);
}

#[tokio::test(start_paused = true)]
async fn test_upload_failure_is_not_retried_or_polled() {
    let api = Arc::new(
        ScriptedRemoteApi::new(42)
            .with_upload_error(RemoteError::Transport("broken pipe".into()))
            .with_sub_resources(journeys()),
    );
    let orchestrator = WorkflowOrchestrator::new(api.clone());
    let start = Instant::now();

    let err = assert_failed_with(orchestrator.run(run_42()).await, "upload_failed");

    match err {
        WorkflowError::UploadFailed { upload_id, .. } => assert_eq!(upload_id, "u-1"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::UploadPayload { .. })), 1);
    assert_eq!(api.status_checks(), 0);
    assert_eq!(api.count_calls(|c| matches!(c, RemoteCall::Trigger(_))), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
}
