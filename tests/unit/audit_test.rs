//! Tests for audit sink

use prometheus_task_scheduler::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, TaskId, TaskPriority,
    TracingAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let id = TaskId::new();

    let event = build_audit_event(
        id,
        "task1",
        TaskPriority::High,
        AuditAction::Submit,
        Some("payload".to_string()),
    );

    sink.record(event);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].task_id, id);
    assert_eq!(events[0].task_name, "task1");
    assert_eq!(events[0].action, AuditAction::Submit);
    assert_eq!(events[0].detail.as_deref(), Some("payload"));
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    let ids: Vec<TaskId> = (0..3).map(|_| TaskId::new()).collect();

    for id in &ids {
        sink.record(build_audit_event(*id, "t", TaskPriority::Low, AuditAction::Submit, None));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, ids[1]); // First one popped
    assert_eq!(events[1].task_id, ids[2]);
}

#[test]
fn test_clones_share_buffer() {
    let sink = InMemoryAuditSink::new(8);
    let handle = sink.clone();
    let id = TaskId::new();

    sink.record(build_audit_event(id, "t", TaskPriority::Medium, AuditAction::Dispatch, None));
    sink.record(build_audit_event(id, "t", TaskPriority::Medium, AuditAction::Complete, None));
    sink.record(build_audit_event(TaskId::new(), "other", TaskPriority::Medium, AuditAction::Submit, None));

    assert_eq!(
        handle.actions_for(id),
        vec![AuditAction::Dispatch, AuditAction::Complete]
    );
}

#[test]
fn test_build_audit_event() {
    let id = TaskId::new();
    let event = build_audit_event(
        id,
        "task1",
        TaskPriority::Critical,
        AuditAction::Fail,
        Some("boom".to_string()),
    );

    assert_eq!(event.priority, TaskPriority::Critical);
    assert_eq!(event.action.to_string(), "fail");
    assert!(event.created_at_ms > 0);

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "fail");
    assert_eq!(json["priority"], "critical");
    assert_eq!(json["task_id"], id.to_string());
}

#[test]
fn test_tracing_sink_accepts_events() {
    let sink = TracingAuditSink;
    sink.record(build_audit_event(TaskId::new(), "t", TaskPriority::Low, AuditAction::Cancel, None));
}
