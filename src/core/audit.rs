//! Audit trail of task lifecycle transitions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::task::{TaskId, TaskPriority};
use crate::util::clock::now_ms;

/// Lifecycle transition recorded by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task accepted by `add_task`.
    Submit,
    /// Task refused by `add_task`.
    Reject,
    /// Task placed in the pending queue.
    Enqueue,
    /// Resources granted and callback spawned.
    Dispatch,
    /// Callback returned successfully.
    Complete,
    /// Callback errored or panicked, or the task became infeasible.
    Fail,
    /// Task canceled while queued or running.
    Cancel,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Reject => "reject",
            Self::Enqueue => "enqueue",
            Self::Dispatch => "dispatch",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related task identifier.
    pub task_id: TaskId,
    /// Task name.
    pub task_name: String,
    /// Task priority.
    pub priority: TaskPriority,
    /// Transition taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context (error text, granted amounts).
    pub detail: Option<String>,
}

/// Audit sink abstraction.
///
/// Called with the scheduler lock held, so implementations must not block.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory audit sink for testing and dev.
///
/// Clones share the same buffer, so a test can keep one handle while the
/// manager owns another.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Actions recorded for one task, oldest first.
    #[must_use]
    pub fn actions_for(&self, task_id: TaskId) -> Vec<AuditAction> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.task_id == task_id)
            .map(|event| event.action)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::debug!(
            event_id = %event.event_id,
            task_id = %event.task_id,
            task = %event.task_name,
            action = %event.action,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    task_id: TaskId,
    task_name: impl Into<String>,
    priority: TaskPriority,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    let created_at_ms = now_ms();
    AuditEvent {
        event_id: format!("{task_id}-{action}-{created_at_ms}"),
        task_id,
        task_name: task_name.into(),
        priority,
        action,
        created_at_ms,
        detail,
    }
}
