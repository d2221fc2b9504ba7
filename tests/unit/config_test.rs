//! Tests for configuration validation

use prometheus_task_scheduler::config::SchedulerConfig;
use prometheus_task_scheduler::core::ResourceType;

#[test]
fn test_default_config_is_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert!(cfg.max_concurrent_tasks >= 1);
    assert_eq!(cfg.history_limit, 100);
    assert!((cfg.default_capacity - 1.0).abs() < f64::EPSILON);
    assert!(cfg.reject_infeasible);
    assert!(cfg.resources.is_empty());
}

#[test]
fn test_invalid_max_concurrent_tasks() {
    let cfg = SchedulerConfig::new().with_max_concurrent_tasks(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_history_limit() {
    let cfg = SchedulerConfig::new().with_history_limit(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_default_capacity() {
    assert!(SchedulerConfig::new().with_default_capacity(0.0).validate().is_err());
    assert!(SchedulerConfig::new().with_default_capacity(f64::NAN).validate().is_err());
}

#[test]
fn test_invalid_resource_capacity() {
    let err = SchedulerConfig::new()
        .with_resource(ResourceType::Memory, -0.5)
        .validate()
        .unwrap_err();
    assert!(err.contains("memory"));

    // Zero is allowed: the pool exists but admits nothing.
    assert!(SchedulerConfig::new()
        .with_resource(ResourceType::Gpu, 0.0)
        .validate()
        .is_ok());
}

#[test]
fn test_from_json_str() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{"max_concurrent_tasks": 2, "resources": {"cpu": 1.5, "tokens": 10}}"#,
    )
    .unwrap();
    assert_eq!(cfg.max_concurrent_tasks, 2);
    assert_eq!(cfg.history_limit, 100);
    assert_eq!(cfg.resources.get(&ResourceType::Cpu), Some(&1.5));
    assert_eq!(
        cfg.resources.get(&ResourceType::Custom("tokens".into())),
        Some(&10.0)
    );
}

#[test]
fn test_from_json_str_errors() {
    let err = SchedulerConfig::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));

    let err = SchedulerConfig::from_json_str(r#"{"max_concurrent_tasks": 0}"#).unwrap_err();
    assert!(err.contains("max_concurrent_tasks"));
}

#[test]
fn test_json_round_trip_keeps_resource_names() {
    let cfg = SchedulerConfig::new()
        .with_max_concurrent_tasks(3)
        .with_resource("llm_slots", 4.0);
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"llm_slots\""));
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}
