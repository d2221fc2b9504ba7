//! Tests for error types

use prometheus_task_scheduler::core::{
    AppResult, ResourceType, SchedulerError, SubmissionError, TaskId,
};

#[test]
fn test_missing_callback_error() {
    let err = SubmissionError::MissingCallback("job".to_string());
    assert_eq!(format!("{}", err), "task `job` has no callback");
}

#[test]
fn test_infeasible_requirement_error() {
    let err = SubmissionError::InfeasibleRequirement {
        resource: ResourceType::Gpu,
        min_amount: 2.0,
        capacity: 1.0,
    };
    assert_eq!(
        format!("{}", err),
        "infeasible requirement for gpu: min_amount 2 exceeds capacity 1"
    );
}

#[test]
fn test_invalid_requirement_names_resource() {
    let err = SubmissionError::InvalidRequirement {
        resource: ResourceType::Custom("tokens".into()),
        reason: "amounts must be finite".into(),
    };
    assert_eq!(
        format!("{}", err),
        "invalid requirement for tokens: amounts must be finite"
    );
}

#[test]
fn test_duplicate_task_error() {
    let id = TaskId::new();
    let err = SubmissionError::DuplicateTask(id);
    assert_eq!(format!("{}", err), format!("duplicate task id {id}"));
}

#[test]
fn test_submission_converts_into_scheduler_error() {
    let err: SchedulerError = SubmissionError::MissingCallback("job".into()).into();
    assert!(matches!(err, SchedulerError::Submission(_)));
    assert_eq!(
        format!("{}", err),
        "submission rejected: task `job` has no callback"
    );
}

#[test]
fn test_scheduler_error_display() {
    assert_eq!(
        format!("{}", SchedulerError::InvalidConfig("bad".into())),
        "invalid configuration: bad"
    );
    assert_eq!(format!("{}", SchedulerError::Canceled), "task canceled");
    assert_eq!(
        format!("{}", SchedulerError::Execution("boom".into())),
        "execution failed: boom"
    );
}

#[test]
fn test_app_result_downcasts_to_scheduler_error() {
    fn cancelled_step() -> AppResult<()> {
        Err(SchedulerError::Canceled.into())
    }

    let err = cancelled_step().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SchedulerError>(),
        Some(SchedulerError::Canceled)
    ));
}
