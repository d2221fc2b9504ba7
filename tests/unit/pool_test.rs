//! Tests for resource pool accounting through the public API

use prometheus_task_scheduler::core::{ResourcePool, ResourceType};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_partial_grant_when_short() {
    let mut pool = ResourcePool::new(ResourceType::Memory, 1.0);
    assert!(approx(pool.allocate("a", 0.6), 0.6));
    assert!(approx(pool.allocate("b", 0.6), 0.4));
    assert!(approx(pool.allocate("c", 0.1), 0.0));
    assert!(approx(pool.available(), 0.0));
    assert!(approx(pool.utilization(), 1.0));
}

#[test]
fn test_release_unknown_consumer_is_noop() {
    let mut pool = ResourcePool::new("tokens", 10.0);
    assert!(approx(pool.release("ghost"), 0.0));
    assert_eq!(pool.consumer_count(), 0);
}

#[test]
fn test_reservation_reduces_available() {
    let mut pool = ResourcePool::new(ResourceType::Gpu, 1.0);
    assert!(approx(pool.reserve(0.25), 0.25));
    assert!(approx(pool.allocate("job", 1.0), 0.75));
    assert!(approx(pool.unreserve(1.0), 0.25));
    assert!(approx(pool.available(), 0.25));
}

#[test]
fn test_peak_usage_tracks_maximum() {
    let mut pool = ResourcePool::new(ResourceType::Cpu, 1.0);
    pool.allocate("a", 0.3);
    pool.allocate("b", 0.5);
    pool.release("a");
    pool.release("b");

    let metrics = pool.metrics();
    assert!(approx(metrics.peak_usage, 0.8));
    assert_eq!(metrics.samples, 4);
}
