//! Task data model: identifiers, priorities, resource requirements and snapshots.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{AppResult, SchedulerError, SubmissionError};
use super::executor::TaskHandler;
use crate::util::clock::now_ms;

/// Category of a schedulable resource. Used purely as a pool key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    /// Compute share.
    Cpu,
    /// Memory share.
    Memory,
    /// Accelerator share.
    Gpu,
    /// Network bandwidth share.
    Network,
    /// Disk or object storage share.
    Storage,
    /// Caller-defined category.
    Custom(String),
}

impl ResourceType {
    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Gpu => "gpu",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "cpu" => Self::Cpu,
            "memory" => Self::Memory,
            "gpu" => Self::Gpu,
            "network" => Self::Network,
            "storage" => Self::Storage,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        match value {
            ResourceType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Urgency band used to order the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default band.
    #[default]
    Medium,
    /// Ahead of regular work.
    High,
    /// Always considered first.
    Critical,
}

/// A `(resource, amount, min_amount)` triple attached to a task.
///
/// The scheduler grants `amount` when it fits, otherwise falls back to
/// `min_amount`. By default both are equal, which makes the requirement
/// all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    resource_type: ResourceType,
    amount: f64,
    min_amount: f64,
}

impl ResourceRequirement {
    /// All-or-nothing requirement for `amount` units of `resource_type`.
    pub fn new(resource_type: impl Into<ResourceType>, amount: f64) -> Self {
        Self {
            resource_type: resource_type.into(),
            amount,
            min_amount: amount,
        }
    }

    /// Accept as little as `min_amount` when the full amount is unavailable.
    #[must_use]
    pub fn with_min_amount(mut self, min_amount: f64) -> Self {
        self.min_amount = min_amount;
        self
    }

    /// Target resource.
    #[must_use]
    pub const fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// Desired amount.
    #[must_use]
    pub const fn amount(&self) -> f64 {
        self.amount
    }

    /// Minimum acceptable amount.
    #[must_use]
    pub const fn min_amount(&self) -> f64 {
        self.min_amount
    }

    /// Check `0 < min_amount <= amount` with finite values.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::InvalidRequirement` describing the violation.
    pub fn validate(&self) -> Result<(), SubmissionError> {
        let invalid = |reason: String| SubmissionError::InvalidRequirement {
            resource: self.resource_type.clone(),
            reason,
        };
        if !self.amount.is_finite() || !self.min_amount.is_finite() {
            return Err(invalid("amounts must be finite".into()));
        }
        if self.min_amount <= 0.0 {
            return Err(invalid(format!(
                "min_amount must be positive, got {}",
                self.min_amount
            )));
        }
        if self.min_amount > self.amount {
            return Err(invalid(format!(
                "min_amount {} exceeds amount {}",
                self.min_amount, self.amount
            )));
        }
        Ok(())
    }
}

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Built but not yet submitted.
    Pending,
    /// Waiting for capacity.
    Queued,
    /// Callback is executing.
    Running,
    /// Callback returned successfully.
    Completed,
    /// Callback returned an error or panicked.
    Failed,
    /// Canceled before or during execution.
    Canceled,
}

impl TaskStatus {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed future produced by a task callback.
pub type TaskFuture = BoxFuture<'static, AppResult<Value>>;

/// Type-erased callback stored on a task until it is dispatched.
pub(crate) type TaskCallback = Box<dyn FnOnce(TaskContext) -> TaskFuture + Send + 'static>;

/// Execution context handed to a running callback.
///
/// Carries the amounts actually granted and the cooperative cancellation
/// signal. Callbacks are expected to poll `is_cancelled` or await
/// `cancelled` at their own suspension points.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: TaskId,
    name: String,
    args: Value,
    granted: HashMap<ResourceType, f64>,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: TaskId,
        name: String,
        args: Value,
        granted: HashMap<ResourceType, f64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            name,
            args,
            granted,
            cancel,
        }
    }

    /// Identifier of the running task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Caller-supplied arguments.
    #[must_use]
    pub const fn args(&self) -> &Value {
        &self.args
    }

    /// Amount granted for `resource`, 0 if the task did not request it.
    #[must_use]
    pub fn granted(&self, resource: &ResourceType) -> f64 {
        self.granted.get(resource).copied().unwrap_or(0.0)
    }

    /// All granted amounts.
    #[must_use]
    pub const fn grants(&self) -> &HashMap<ResourceType, f64> {
        &self.granted
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Clone of the underlying token, for handing to nested work.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bail out with `SchedulerError::Canceled` if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Canceled` once the task has been canceled.
    pub fn ensure_active(&self) -> Result<(), SchedulerError> {
        if self.is_cancelled() {
            Err(SchedulerError::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Unit of work submitted to the `ResourceManager`.
///
/// ```rust,ignore
/// let task = Task::new("embed-batch")
///     .with_priority(TaskPriority::High)
///     .with_requirement(ResourceRequirement::new(ResourceType::Gpu, 0.5).with_min_amount(0.25))
///     .with_callback(|ctx| async move { Ok(serde_json::json!({ "gpu": ctx.granted(&ResourceType::Gpu) })) });
/// let id = manager.add_task(task)?;
/// ```
pub struct Task {
    id: TaskId,
    name: String,
    priority: TaskPriority,
    requirements: Vec<ResourceRequirement>,
    args: Value,
    callback: Option<TaskCallback>,
    status: TaskStatus,
    result: Option<Value>,
    error: Option<String>,
    created_at_ms: u128,
}

impl Task {
    /// New pending task with medium priority, no requirements and no callback.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            priority: TaskPriority::default(),
            requirements: Vec::new(),
            args: Value::Null,
            callback: None,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at_ms: now_ms(),
        }
    }

    /// Override the generated identifier.
    #[must_use]
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Set the priority band.
    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add one resource requirement.
    #[must_use]
    pub fn with_requirement(mut self, requirement: ResourceRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Add several resource requirements.
    #[must_use]
    pub fn with_requirements(
        mut self,
        requirements: impl IntoIterator<Item = ResourceRequirement>,
    ) -> Self {
        self.requirements.extend(requirements);
        self
    }

    /// Attach arguments exposed to the callback through `TaskContext::args`.
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Attach the async callback to run once resources are granted.
    #[must_use]
    pub fn with_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        self.callback = Some(Box::new(move |ctx: TaskContext| -> TaskFuture {
            Box::pin(callback(ctx))
        }));
        self
    }

    /// Attach a shared `TaskHandler` as the callback.
    #[must_use]
    pub fn with_handler<H: TaskHandler>(self, handler: Arc<H>) -> Self {
        self.with_callback(move |ctx| async move { handler.run(ctx).await })
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority band.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Resource requirements.
    #[must_use]
    pub fn requirements(&self) -> &[ResourceRequirement] {
        &self.requirements
    }

    /// Callback arguments.
    #[must_use]
    pub const fn args(&self) -> &Value {
        &self.args
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Callback result once completed.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Failure description once failed or canceled.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Creation timestamp in milliseconds since epoch.
    #[must_use]
    pub const fn created_at_ms(&self) -> u128 {
        self.created_at_ms
    }

    /// Whether a callback has been attached.
    #[must_use]
    pub const fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Structural validation independent of pool state.
    pub(crate) fn validate(&self) -> Result<(), SubmissionError> {
        if self.callback.is_none() {
            return Err(SubmissionError::MissingCallback(self.name.clone()));
        }
        self.requirements
            .iter()
            .try_for_each(ResourceRequirement::validate)
    }

    pub(crate) fn take_callback(&mut self) -> Option<TaskCallback> {
        self.callback.take()
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn set_outcome(
        &mut self,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) {
        self.status = status;
        self.result = result;
        self.error = error;
    }

    pub(crate) fn snapshot(
        &self,
        granted: HashMap<ResourceType, f64>,
        started_at_ms: Option<u128>,
        finished_at_ms: Option<u128>,
    ) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            status: self.status,
            requirements: self.requirements.clone(),
            granted,
            result: self.result.clone(),
            error: self.error.clone(),
            created_at_ms: self.created_at_ms,
            started_at_ms,
            finished_at_ms,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("requirements", &self.requirements)
            .field("status", &self.status)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

/// Read-only view of a task returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task name.
    pub name: String,
    /// Priority band.
    pub priority: TaskPriority,
    /// Status at the time of the snapshot.
    pub status: TaskStatus,
    /// Requested resources.
    pub requirements: Vec<ResourceRequirement>,
    /// Amounts granted at dispatch; empty if the task never ran.
    pub granted: HashMap<ResourceType, f64>,
    /// Callback result.
    pub result: Option<Value>,
    /// Failure or cancellation description.
    pub error: Option<String>,
    /// Creation time (ms since epoch).
    pub created_at_ms: u128,
    /// Dispatch time (ms since epoch).
    pub started_at_ms: Option<u128>,
    /// Terminal transition time (ms since epoch).
    pub finished_at_ms: Option<u128>,
}

impl TaskSnapshot {
    /// Wall time between dispatch and terminal transition.
    #[must_use]
    pub fn run_time_ms(&self) -> Option<u128> {
        match (self.started_at_ms, self.finished_at_ms) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}
