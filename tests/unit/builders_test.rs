//! Tests for builders

use std::future::Future;

use prometheus_task_scheduler::builders::build_manager;
use prometheus_task_scheduler::config::SchedulerConfig;
use prometheus_task_scheduler::core::{ResourceManager, ResourceType, SchedulerError, Spawn};

// Simple tokio spawner for tests
#[derive(Clone)]
struct TestSpawner;

impl Spawn for TestSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

#[tokio::test]
async fn test_build_manager_with_custom_spawner() {
    let cfg = SchedulerConfig::new()
        .with_max_concurrent_tasks(3)
        .with_resource(ResourceType::Memory, 0.5);
    let manager = build_manager(&cfg, TestSpawner).unwrap();

    assert_eq!(manager.max_concurrent_tasks(), 3);
    assert_eq!(
        manager.with_pool(&ResourceType::Memory, |pool| pool.capacity()),
        Some(0.5)
    );
    assert!(manager.with_pool(&ResourceType::Cpu, |_| ()).is_none());
}

#[tokio::test]
async fn test_with_spawner_validates_config() {
    let cfg = SchedulerConfig::new().with_history_limit(0);
    let result = ResourceManager::with_spawner(cfg, TestSpawner);
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}
