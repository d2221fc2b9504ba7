//! Core scheduling abstractions and capacity accounting.

pub mod admission;
pub mod audit;
pub mod error;
pub mod executor;
pub mod manager;
pub mod resource_pool;
pub mod task;

pub use admission::{plan_allocation, resolve_amount, AllocationPlan};
pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use error::{AppResult, SchedulerError, SubmissionError};
pub use executor::{Spawn, TaskHandler};
pub use manager::{ResourceManager, ResourceUsage, SchedulerStats};
pub use resource_pool::{ResourcePool, UsageMetrics, AMOUNT_EPSILON};
pub use task::{
    ResourceRequirement, ResourceType, Task, TaskContext, TaskFuture, TaskId, TaskPriority,
    TaskSnapshot, TaskStatus,
};
