//! Tests for runtime adapters

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prometheus_task_scheduler::core::Spawn;
use prometheus_task_scheduler::runtime::TokioSpawner;

#[tokio::test]
async fn test_tokio_spawner_runs_futures() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let counter = Arc::clone(&counter);
        spawner.spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[test]
fn test_spawner_from_explicit_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let spawner = TokioSpawner::new(runtime.handle().clone());
    let (tx, rx) = std::sync::mpsc::channel();

    spawner.spawn(async move {
        let _ = tx.send("done");
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("done"));
}
