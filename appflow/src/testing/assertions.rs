//! Assertions on workflow outcomes.

use crate::errors::WorkflowError;
use crate::workflow::RunReport;

/// Asserts that a run failed with the given error kind and returns the error.
///
/// # Panics
///
/// Panics if the run succeeded or failed with another kind.
#[track_caller]
pub fn assert_failed_with(result: Result<RunReport, WorkflowError>, kind: &str) -> WorkflowError {
    match result {
        Ok(report) => panic!("expected {kind} failure, run succeeded: {report:?}"),
        Err(e) => {
            assert_eq!(e.kind(), kind, "unexpected failure: {e}");
            e
        }
    }
}

/// Asserts that a run succeeded and triggered exactly `names`, in order.
///
/// # Panics
///
/// Panics if the run failed or triggered different sub-resources.
#[track_caller]
pub fn assert_triggered(result: &Result<RunReport, WorkflowError>, names: &[&str]) {
    match result {
        Ok(report) => assert_eq!(report.triggered_names(), names),
        Err(e) => panic!("expected success, run failed: {e}"),
    }
}
