//! Execution seams: reusable task handlers and the runtime spawner.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use super::error::AppResult;
use super::task::TaskContext;

/// Reusable business logic that can back many tasks.
///
/// Closures attached with `Task::with_callback` cover one-off work; a
/// `TaskHandler` shared behind an `Arc` suits executors that hold state such
/// as model handles or HTTP clients.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_scheduler::core::{AppResult, TaskContext, TaskHandler};
///
/// struct Summarizer;
///
/// #[async_trait]
/// impl TaskHandler for Summarizer {
///     async fn run(&self, ctx: TaskContext) -> AppResult<serde_json::Value> {
///         ctx.ensure_active()?;
///         Ok(serde_json::json!({ "summary": ctx.args()["text"] }))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Run the task. Long-running handlers should check
    /// `TaskContext::is_cancelled` between steps.
    ///
    /// # Errors
    ///
    /// Any error marks the task `failed` with the error's display text.
    async fn run(&self, ctx: TaskContext) -> AppResult<Value>;
}

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
