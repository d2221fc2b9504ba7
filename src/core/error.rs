//! Error types for scheduler operations.

use thiserror::Error;

use super::task::{ResourceType, TaskId};

/// Reasons a task is refused by `ResourceManager::add_task`.
///
/// A rejected task never enters the queue and never produces a history entry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmissionError {
    /// The task was built without a callback to run.
    #[error("task `{0}` has no callback")]
    MissingCallback(String),
    /// A resource requirement is malformed (non-finite, non-positive, or `min_amount > amount`).
    #[error("invalid requirement for {resource}: {reason}")]
    InvalidRequirement {
        /// Resource the requirement targets.
        resource: ResourceType,
        /// Human readable description of the violation.
        reason: String,
    },
    /// The requirement's minimum can never fit in the target pool.
    #[error("infeasible requirement for {resource}: min_amount {min_amount} exceeds capacity {capacity}")]
    InfeasibleRequirement {
        /// Resource the requirement targets.
        resource: ResourceType,
        /// Minimum amount the task accepts.
        min_amount: f64,
        /// Total capacity of the pool.
        capacity: f64,
    },
    /// A task with the same identifier is already known to the manager.
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),
}

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task submission was refused.
    #[error("submission rejected: {0}")]
    Submission(#[from] SubmissionError),
    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The task observed its cancellation signal and stopped.
    #[error("task canceled")]
    Canceled,
    /// The task callback failed.
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
