//! # Prometheus Task Scheduler
//!
//! A resource-aware priority scheduler for async AI workloads.
//!
//! Tasks declare how much of each resource (CPU, memory, GPU share, or any
//! custom category) they need, and are queued by priority until the
//! scheduler can grant it. Granted amounts are held until the task
//! completes, fails or is canceled, then returned to their pools.
//!
//! ## Key Features
//!
//! - **Two-Phase Admission**: each requirement gets its full amount when it fits, otherwise its declared minimum
//! - **Priority Dispatch**: `critical > high > medium > low`, FIFO within a band, small tasks may overtake blocked large ones
//! - **Concurrency Cap**: at most `max_concurrent_tasks` callbacks run at once
//! - **Cooperative Cancellation**: running callbacks observe a token through `TaskContext`
//! - **Bounded History**: terminal task snapshots with results, errors and timings
//! - **Usage Metrics**: peak and average utilization per pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_task_scheduler::config::SchedulerConfig;
//! use prometheus_task_scheduler::core::{
//!     ResourceManager, ResourceRequirement, ResourceType, Task, TaskPriority,
//! };
//!
//! let manager = ResourceManager::with_config(
//!     SchedulerConfig::new()
//!         .with_max_concurrent_tasks(4)
//!         .with_resource(ResourceType::Gpu, 1.0),
//! )?;
//!
//! let id = manager.add_task(
//!     Task::new("generate")
//!         .with_priority(TaskPriority::High)
//!         .with_requirement(ResourceRequirement::new(ResourceType::Gpu, 0.5).with_min_amount(0.25))
//!         .with_callback(|ctx| async move {
//!             ctx.ensure_active()?;
//!             Ok(serde_json::json!({ "gpu": ctx.granted(&ResourceType::Gpu) }))
//!         }),
//! )?;
//!
//! let snapshot = manager.wait_for_task(id, Duration::from_secs(30)).await;
//! ```
//!
//! For complete scenarios, see `tests/scheduler_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for the scheduler and its pools.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Infrastructure adapters for the pending queue.
pub mod infra;
/// Runtime adapters that execute task callbacks.
pub mod runtime;
/// Shared utilities.
pub mod util;
