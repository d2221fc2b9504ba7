//! Resource manager: admission, greedy priority dispatch, cancellation and history.
//!
//! All scheduler state (pools, pending queue, active tasks, history) lives
//! behind one `parking_lot::Mutex`. Every admission decision is taken with
//! that lock held, so `add_task`, a task's completion and `cancel_task` can
//! race freely without leaving pools and queue inconsistent. Callbacks are
//! spawned only after the lock is released.
//!
//! # Dispatch
//!
//! After every event that can free capacity (task added, task terminal,
//! pool resized, cap raised) the queue is scanned in
//! `(priority DESC, arrival ASC)` order while fewer than
//! `max_concurrent_tasks` tasks run. Each task is planned with the two-phase
//! rule from [`crate::core::admission`]; a task that does not fit keeps its
//! place and the scan moves on, so a small later task may overtake a large
//! earlier one.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_task_scheduler::core::{ResourceManager, ResourceRequirement, ResourceType, Task, TaskPriority};
//!
//! let manager = ResourceManager::new();
//! manager.configure_resource(ResourceType::Memory, 0.5)?;
//! let id = manager.add_task(
//!     Task::new("index")
//!         .with_priority(TaskPriority::High)
//!         .with_requirement(ResourceRequirement::new(ResourceType::Memory, 0.4).with_min_amount(0.3))
//!         .with_callback(|ctx| async move { Ok(serde_json::json!(ctx.granted(&ResourceType::Memory))) }),
//! )?;
//! let done = manager.wait_for_task(id, Duration::from_secs(5)).await;
//! ```

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::admission::{commit_plan, plan_allocation, release_grants};
use super::audit::{build_audit_event, AuditAction, AuditSink};
use super::error::{SchedulerError, SubmissionError};
use super::executor::Spawn;
use super::resource_pool::{ResourcePool, UsageMetrics, AMOUNT_EPSILON};
use super::task::{
    ResourceType, Task, TaskCallback, TaskContext, TaskId, TaskSnapshot, TaskStatus,
};
use crate::builders::build_manager;
use crate::config::SchedulerConfig;
use crate::infra::queue::InMemoryQueue;
use crate::runtime::TokioSpawner;
use crate::util::clock::now_ms;

/// Counters and gauges describing scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Tasks accepted by `add_task`.
    pub submitted_tasks: u64,
    /// Tasks refused by `add_task`.
    pub rejected_tasks: u64,
    /// Tasks whose callback returned successfully.
    pub completed_tasks: u64,
    /// Tasks that errored, panicked or became infeasible.
    pub failed_tasks: u64,
    /// Tasks canceled while queued or running.
    pub canceled_tasks: u64,
    /// Tasks currently running.
    pub active_tasks: usize,
    /// Tasks currently queued.
    pub queued_tasks: usize,
    /// Current concurrency cap.
    pub max_concurrent_tasks: usize,
}

/// Point-in-time view of one resource pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resource the pool accounts for.
    pub resource_type: ResourceType,
    /// Total capacity.
    pub capacity: f64,
    /// Sum of task allocations.
    pub allocated: f64,
    /// Headroom held without a consumer.
    pub reserved: f64,
    /// Grantable capacity.
    pub available: f64,
    /// `allocated / capacity`.
    pub utilization: f64,
    /// Peak and average usage.
    pub metrics: UsageMetrics,
}

impl ResourceUsage {
    fn from_pool(pool: &ResourcePool) -> Self {
        Self {
            resource_type: pool.resource_type().clone(),
            capacity: pool.capacity(),
            allocated: pool.allocated(),
            reserved: pool.reserved(),
            available: pool.available(),
            utilization: pool.utilization(),
            metrics: pool.metrics(),
        }
    }
}

/// How a running task ended.
enum Outcome {
    Completed(Value),
    Failed(String),
    Canceled(String),
}

/// A dispatched task: holds resources until it reaches a terminal state.
struct ActiveTask {
    task: Task,
    granted: HashMap<ResourceType, f64>,
    cancel: CancellationToken,
    started_at_ms: u128,
}

/// Callback ready to be handed to the runtime once the lock is dropped.
struct Launch {
    task_id: TaskId,
    callback: TaskCallback,
    ctx: TaskContext,
}

/// Everything guarded by the scheduler lock.
pub(crate) struct SchedulerState {
    pools: HashMap<ResourceType, ResourcePool>,
    queue: InMemoryQueue,
    active: HashMap<TaskId, ActiveTask>,
    history: VecDeque<TaskSnapshot>,
    max_concurrent_tasks: usize,
    history_limit: usize,
    default_capacity: f64,
    reject_infeasible: bool,
    counters: SchedulerStats,
    audit: Option<Arc<dyn AuditSink>>,
    /// Set once the owning manager is dropped; nothing dispatches afterwards.
    closed: bool,
}

impl SchedulerState {
    pub(crate) fn new(cfg: &SchedulerConfig) -> Self {
        let pools = cfg
            .resources
            .iter()
            .map(|(kind, capacity)| (kind.clone(), ResourcePool::new(kind.clone(), *capacity)))
            .collect();
        Self {
            pools,
            queue: InMemoryQueue::new(),
            active: HashMap::new(),
            history: VecDeque::with_capacity(cfg.history_limit.min(1024)),
            max_concurrent_tasks: cfg.max_concurrent_tasks,
            history_limit: cfg.history_limit,
            default_capacity: cfg.default_capacity,
            reject_infeasible: cfg.reject_infeasible,
            counters: SchedulerStats::default(),
            audit: None,
            closed: false,
        }
    }

    fn record(&self, task: &Task, action: AuditAction, detail: Option<String>) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(
                task.id(),
                task.name(),
                task.priority(),
                action,
                detail,
            ));
        }
    }

    fn is_known(&self, id: &TaskId) -> bool {
        self.queue.contains(id)
            || self.active.contains_key(id)
            || self.history.iter().any(|snap| snap.task_id == *id)
    }

    /// First requirement total whose minimum cannot fit its pool's capacity.
    fn infeasibility(&self, task: &Task) -> Option<SubmissionError> {
        let mut minimums: HashMap<&ResourceType, f64> = HashMap::new();
        for requirement in task.requirements() {
            *minimums.entry(requirement.resource_type()).or_insert(0.0) +=
                requirement.min_amount();
        }
        minimums.into_iter().find_map(|(kind, min_amount)| {
            let capacity = self
                .pools
                .get(kind)
                .map_or(self.default_capacity, ResourcePool::capacity);
            (min_amount > capacity + AMOUNT_EPSILON).then(|| {
                SubmissionError::InfeasibleRequirement {
                    resource: kind.clone(),
                    min_amount,
                    capacity,
                }
            })
        })
    }

    fn validate(&mut self, task: &Task) -> Result<(), SubmissionError> {
        task.validate()?;
        if self.is_known(&task.id()) {
            return Err(SubmissionError::DuplicateTask(task.id()));
        }
        // Unseen resources are judged against the capacity their pool will get.
        if self.reject_infeasible {
            if let Some(err) = self.infeasibility(task) {
                return Err(err);
            }
        }
        for requirement in task.requirements() {
            let kind = requirement.resource_type();
            if !self.pools.contains_key(kind) {
                debug!(resource = %kind, capacity = self.default_capacity, "creating pool on first use");
                self.pools
                    .insert(kind.clone(), ResourcePool::new(kind.clone(), self.default_capacity));
            }
        }
        Ok(())
    }

    /// Validate and enqueue. Dispatch is left to the caller.
    fn submit(&mut self, mut task: Task) -> Result<TaskId, SubmissionError> {
        let task_id = task.id();
        if let Err(err) = self.validate(&task) {
            self.counters.rejected_tasks += 1;
            warn!(task_id = %task_id, task = %task.name(), error = %err, "task rejected");
            self.record(&task, AuditAction::Reject, Some(err.to_string()));
            return Err(err);
        }
        self.counters.submitted_tasks += 1;
        task.set_status(TaskStatus::Queued);
        self.record(&task, AuditAction::Submit, None);
        self.queue.enqueue(task);
        Ok(task_id)
    }

    /// Greedy priority scan: move every task that fits into the active set.
    fn dispatch(&mut self) -> Vec<Launch> {
        let mut launches = Vec::new();
        if self.closed {
            return launches;
        }
        for task_id in self.queue.ids_in_order() {
            if self.active.len() >= self.max_concurrent_tasks {
                debug!(
                    active = self.active.len(),
                    max = self.max_concurrent_tasks,
                    "concurrency cap reached"
                );
                break;
            }
            let plan = self
                .queue
                .get(&task_id)
                .and_then(|task| plan_allocation(&self.pools, task.requirements()));
            let Some(plan) = plan else {
                debug!(task_id = %task_id, "insufficient resources, task stays queued");
                continue;
            };
            let Some(mut task) = self.queue.remove(&task_id) else {
                continue;
            };
            let Some(callback) = task.take_callback() else {
                task.set_outcome(TaskStatus::Failed, None, Some("task has no callback".into()));
                self.counters.failed_tasks += 1;
                self.record(&task, AuditAction::Fail, task.error().map(str::to_string));
                self.push_history(task.snapshot(HashMap::new(), None, Some(now_ms())));
                continue;
            };

            let granted = commit_plan(&mut self.pools, &task_id.to_string(), &plan);
            let cancel = CancellationToken::new();
            let ctx = TaskContext::new(
                task_id,
                task.name().to_string(),
                task.args().clone(),
                granted.clone(),
                cancel.clone(),
            );
            task.set_status(TaskStatus::Running);
            info!(
                task_id = %task_id,
                task = %task.name(),
                priority = ?task.priority(),
                granted = ?granted,
                "task dispatched"
            );
            self.record(&task, AuditAction::Dispatch, Some(format!("{granted:?}")));
            self.active.insert(
                task_id,
                ActiveTask {
                    task,
                    granted,
                    cancel,
                    started_at_ms: now_ms(),
                },
            );
            launches.push(Launch {
                task_id,
                callback,
                ctx,
            });
        }
        launches
    }

    fn push_history(&mut self, snapshot: TaskSnapshot) {
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(snapshot);
    }

    /// Completion path for a running task. Returns false if it is no longer active.
    fn finish(&mut self, task_id: TaskId, outcome: Outcome) -> bool {
        let Some(ActiveTask {
            mut task,
            granted,
            started_at_ms,
            ..
        }) = self.active.remove(&task_id)
        else {
            return false;
        };
        let freed = release_grants(&mut self.pools, &task_id.to_string(), &granted);

        let action = match outcome {
            Outcome::Completed(value) => {
                self.counters.completed_tasks += 1;
                info!(task_id = %task_id, task = %task.name(), freed, "task completed");
                task.set_outcome(TaskStatus::Completed, Some(value), None);
                AuditAction::Complete
            }
            Outcome::Failed(reason) => {
                self.counters.failed_tasks += 1;
                warn!(task_id = %task_id, task = %task.name(), error = %reason, "task failed");
                task.set_outcome(TaskStatus::Failed, None, Some(reason));
                AuditAction::Fail
            }
            Outcome::Canceled(reason) => {
                self.counters.canceled_tasks += 1;
                info!(task_id = %task_id, task = %task.name(), freed, "running task canceled");
                task.set_outcome(TaskStatus::Canceled, None, Some(reason));
                AuditAction::Cancel
            }
        };
        self.record(&task, action, task.error().map(str::to_string));
        self.push_history(task.snapshot(granted, Some(started_at_ms), Some(now_ms())));
        true
    }

    fn cancel(&mut self, task_id: TaskId) -> bool {
        if let Some(mut task) = self.queue.remove(&task_id) {
            self.counters.canceled_tasks += 1;
            info!(task_id = %task_id, task = %task.name(), "queued task canceled");
            task.set_outcome(
                TaskStatus::Canceled,
                None,
                Some("canceled while queued".into()),
            );
            self.record(&task, AuditAction::Cancel, None);
            self.push_history(task.snapshot(HashMap::new(), None, Some(now_ms())));
            return true;
        }
        if let Some(active) = self.active.get(&task_id) {
            active.cancel.cancel();
            return self.finish(task_id, Outcome::Canceled("canceled while running".into()));
        }
        false
    }

    /// Fail queued tasks whose minimums no longer fit after a capacity change.
    fn fail_infeasible_queued(&mut self) -> usize {
        let doomed: Vec<(TaskId, SubmissionError)> = self
            .queue
            .iter()
            .filter_map(|task| self.infeasibility(task).map(|err| (task.id(), err)))
            .collect();
        let count = doomed.len();
        for (task_id, err) in doomed {
            if let Some(mut task) = self.queue.remove(&task_id) {
                self.counters.failed_tasks += 1;
                warn!(task_id = %task_id, task = %task.name(), error = %err, "queued task can never fit");
                task.set_outcome(TaskStatus::Failed, None, Some(err.to_string()));
                self.record(&task, AuditAction::Fail, task.error().map(str::to_string));
                self.push_history(task.snapshot(HashMap::new(), None, Some(now_ms())));
            }
        }
        count
    }

    fn snapshot_of(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        if let Some(active) = self.active.get(task_id) {
            return Some(active.task.snapshot(
                active.granted.clone(),
                Some(active.started_at_ms),
                None,
            ));
        }
        if let Some(task) = self.queue.get(task_id) {
            return Some(task.snapshot(HashMap::new(), None, None));
        }
        self.history
            .iter()
            .rev()
            .find(|snap| snap.task_id == *task_id)
            .cloned()
    }

    fn cleanup(&mut self) -> (usize, usize) {
        let queued = self.queue.ids_in_order();
        let running: Vec<TaskId> = self.active.keys().copied().collect();
        for task_id in queued.iter().chain(running.iter()) {
            self.cancel(*task_id);
        }
        self.queue.drain();
        self.active.clear();
        self.history.clear();
        for pool in self.pools.values_mut() {
            pool.reset();
        }
        (queued.len(), running.len())
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active.is_empty()
    }
}

struct Shared<S> {
    state: Mutex<SchedulerState>,
    /// Signalled after every terminal transition.
    terminal: Notify,
    spawner: S,
}

impl<S: Spawn> Shared<S> {
    fn launch(self: &Arc<Self>, launches: Vec<Launch>) {
        for launch in launches {
            self.spawner.spawn(run_task(Arc::clone(self), launch));
        }
    }

    fn complete(self: &Arc<Self>, task_id: TaskId, outcome: Outcome) {
        let launches = {
            let mut state = self.state.lock();
            if !state.finish(task_id, outcome) {
                debug!(task_id = %task_id, "late completion ignored, task already terminal");
                return;
            }
            state.dispatch()
        };
        self.terminal.notify_waiters();
        self.launch(launches);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".into())
}

async fn run_task<S: Spawn>(shared: Arc<Shared<S>>, launch: Launch) {
    let Launch {
        task_id,
        callback,
        ctx,
    } = launch;
    let cancel = ctx.cancellation_token();
    debug!(task_id = %task_id, "executing task");

    let outcome = match AssertUnwindSafe(async move { callback(ctx).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Outcome::Completed(value),
        Ok(Err(err)) if cancel.is_cancelled() => {
            Outcome::Canceled(format!("canceled: {err:#}"))
        }
        Ok(Err(err)) => Outcome::Failed(format!("{err:#}")),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(task_id = %task_id, panic = %message, "task panicked");
            Outcome::Failed(format!("task panicked: {message}"))
        }
    };
    shared.complete(task_id, outcome);
}

/// Resource-aware priority scheduler.
///
/// Owns its pools, queue and history; several managers can coexist in one
/// process. Submission never blocks: callbacks run on the spawner `S`
/// (Tokio by default) and report back when they finish.
pub struct ResourceManager<S: Spawn = TokioSpawner> {
    shared: Arc<Shared<S>>,
}

impl ResourceManager<TokioSpawner> {
    /// Manager with default configuration on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(&SchedulerConfig::default(), TokioSpawner::current())
    }

    /// Manager built from `cfg` on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `cfg` does not validate.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_config(cfg: SchedulerConfig) -> Result<Self, SchedulerError> {
        build_manager(&cfg, TokioSpawner::current())
    }
}

impl Default for ResourceManager<TokioSpawner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Spawn> ResourceManager<S> {
    /// Manager built from `cfg` that runs callbacks through `spawner`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `cfg` does not validate.
    pub fn with_spawner(cfg: SchedulerConfig, spawner: S) -> Result<Self, SchedulerError> {
        build_manager(&cfg, spawner)
    }

    /// Assemble a manager without validating `cfg`.
    pub(crate) fn from_parts(cfg: &SchedulerConfig, spawner: S) -> Self {
        info!(
            max_concurrent_tasks = cfg.max_concurrent_tasks,
            history_limit = cfg.history_limit,
            pools = cfg.resources.len(),
            "resource manager initialized"
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::new(cfg)),
                terminal: Notify::new(),
                spawner,
            }),
        }
    }

    /// Attach an audit sink that records every lifecycle transition.
    #[must_use]
    pub fn with_audit(self, sink: impl AuditSink + 'static) -> Self {
        self.shared.state.lock().audit = Some(Arc::new(sink));
        self
    }

    /// Submit a task. Dispatches it right away if it fits, otherwise queues it.
    ///
    /// Returns before the callback runs.
    ///
    /// # Errors
    ///
    /// Returns a `SubmissionError` for a missing callback, a malformed or
    /// infeasible requirement, or a reused task id. Rejected tasks never
    /// enter the queue.
    pub fn add_task(&self, task: Task) -> Result<TaskId, SubmissionError> {
        let (task_id, launches) = {
            let mut state = self.shared.state.lock();
            let task_id = state.submit(task)?;
            let launches = state.dispatch();
            if let Some(task) = state.queue.get(&task_id) {
                debug!(task_id = %task_id, queued = state.queue.len(), "task queued");
                state.record(task, AuditAction::Enqueue, None);
            }
            (task_id, launches)
        };
        self.shared.launch(launches);
        Ok(task_id)
    }

    /// Cancel a queued or running task.
    ///
    /// Running tasks only receive a signal through their `TaskContext`; the
    /// scheduler releases their resources and records them as canceled
    /// immediately, and discards whatever the callback returns later.
    /// Returns false for unknown or already terminal tasks.
    pub fn cancel_task(&self, task_id: TaskId) -> bool {
        let launches = {
            let mut state = self.shared.state.lock();
            if !state.cancel(task_id) {
                debug!(task_id = %task_id, "cancel ignored, task unknown or terminal");
                return false;
            }
            state.dispatch()
        };
        self.shared.terminal.notify_waiters();
        self.shared.launch(launches);
        true
    }

    /// Change the concurrency cap. Running tasks are never preempted.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for 0.
    pub fn set_max_concurrent_tasks(&self, max: usize) -> Result<(), SchedulerError> {
        if max == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent_tasks must be greater than 0".into(),
            ));
        }
        let launches = {
            let mut state = self.shared.state.lock();
            info!(from = state.max_concurrent_tasks, to = max, "concurrency cap changed");
            state.max_concurrent_tasks = max;
            state.dispatch()
        };
        self.shared.launch(launches);
        Ok(())
    }

    /// Current concurrency cap.
    #[must_use]
    pub fn max_concurrent_tasks(&self) -> usize {
        self.shared.state.lock().max_concurrent_tasks
    }

    /// Create a pool or resize an existing one. Existing allocations are kept.
    ///
    /// When infeasible requirements are rejected, queued tasks whose minimum
    /// no longer fits the new capacity fail instead of waiting forever.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for a negative or non-finite capacity.
    pub fn configure_resource(
        &self,
        resource: impl Into<ResourceType>,
        capacity: f64,
    ) -> Result<(), SchedulerError> {
        let resource = resource.into();
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "capacity for {resource} must be a non-negative number, got {capacity}"
            )));
        }
        let (failed, launches) = {
            let mut state = self.shared.state.lock();
            state
                .pools
                .entry(resource.clone())
                .and_modify(|pool| pool.set_capacity(capacity))
                .or_insert_with(|| ResourcePool::new(resource.clone(), capacity));
            info!(resource = %resource, capacity, "resource configured");
            let failed = if state.reject_infeasible {
                state.fail_infeasible_queued()
            } else {
                0
            };
            (failed, state.dispatch())
        };
        if failed > 0 {
            self.shared.terminal.notify_waiters();
        }
        self.shared.launch(launches);
        Ok(())
    }

    /// Hold back headroom in a pool. Returns the amount reserved (0 without a pool).
    pub fn reserve_resource(&self, resource: &ResourceType, amount: f64) -> f64 {
        self.shared
            .state
            .lock()
            .pools
            .get_mut(resource)
            .map_or(0.0, |pool| pool.reserve(amount))
    }

    /// Return reserved headroom and dispatch whatever now fits.
    pub fn unreserve_resource(&self, resource: &ResourceType, amount: f64) -> f64 {
        let (freed, launches) = {
            let mut state = self.shared.state.lock();
            let freed = state
                .pools
                .get_mut(resource)
                .map_or(0.0, |pool| pool.unreserve(amount));
            (freed, state.dispatch())
        };
        self.shared.launch(launches);
        freed
    }

    /// Snapshot of a queued, running or recently finished task.
    #[must_use]
    pub fn get_task(&self, task_id: TaskId) -> Option<TaskSnapshot> {
        self.shared.state.lock().snapshot_of(&task_id)
    }

    /// Terminal tasks, newest first, at most `limit`.
    #[must_use]
    pub fn get_task_history(&self, limit: usize) -> Vec<TaskSnapshot> {
        self.shared
            .state
            .lock()
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Wait until `task_id` is terminal.
    ///
    /// Returns `None` if the task is unknown or `timeout` elapses first.
    pub async fn wait_for_task(&self, task_id: TaskId, timeout: Duration) -> Option<TaskSnapshot> {
        let wait = async {
            loop {
                let notified = self.shared.terminal.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                match self.get_task(task_id) {
                    Some(snapshot) if snapshot.status.is_terminal() => return Some(snapshot),
                    Some(_) => notified.await,
                    None => return None,
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }

    /// Wait until nothing is queued or running. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.shared.terminal.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                let idle = self.shared.state.lock().is_idle();
                if idle {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Cancel every queued and running task, release all resources and
    /// clear queue, active set and history. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let (queued, running) = self.shared.state.lock().cleanup();
        if queued + running > 0 {
            info!(queued, running, "scheduler cleaned up");
        } else {
            debug!("scheduler cleanup: nothing to cancel");
        }
        self.shared.terminal.notify_waiters();
    }

    /// Counters and gauges.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let state = self.shared.state.lock();
        SchedulerStats {
            active_tasks: state.active.len(),
            queued_tasks: state.queue.len(),
            max_concurrent_tasks: state.max_concurrent_tasks,
            ..state.counters
        }
    }

    /// Usage of every pool, ordered by resource.
    #[must_use]
    pub fn resource_usage(&self) -> Vec<ResourceUsage> {
        let state = self.shared.state.lock();
        let mut usage: Vec<ResourceUsage> =
            state.pools.values().map(ResourceUsage::from_pool).collect();
        usage.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
        usage
    }

    /// Amount every pool currently attributes to `task_id`.
    #[must_use]
    pub fn allocations_of(&self, task_id: TaskId) -> HashMap<ResourceType, f64> {
        let consumer = task_id.to_string();
        self.shared
            .state
            .lock()
            .pools
            .iter()
            .map(|(kind, pool)| (kind.clone(), pool.allocation_of(&consumer)))
            .collect()
    }

    /// Inspect one pool under the scheduler lock.
    ///
    /// `f` runs while the lock is held. Calling back into the manager from
    /// `f` deadlocks.
    pub fn with_pool<R>(
        &self,
        resource: &ResourceType,
        f: impl FnOnce(&ResourcePool) -> R,
    ) -> Option<R> {
        self.shared.state.lock().pools.get(resource).map(f)
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Number of running tasks.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.shared.state.lock().active.len()
    }
}

impl<S: Spawn> Drop for ResourceManager<S> {
    fn drop(&mut self) {
        // Running callbacks still report back through the shared state, so
        // dispatch must stay off or queued work would start with nobody to cancel it.
        let mut state = self.shared.state.lock();
        state.closed = true;
        let queued = state.queue.ids_in_order();
        for task_id in &queued {
            state.cancel(*task_id);
        }
        if !state.active.is_empty() || !queued.is_empty() {
            debug!(
                running = state.active.len(),
                queued = queued.len(),
                "manager dropped, canceling queued tasks and signalling running ones"
            );
        }
        for active in state.active.values() {
            active.cancel.cancel();
        }
    }
}
