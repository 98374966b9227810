//! Concurrent stress test for the engine pool.
//!
//! Verifies that 50 concurrent tasks doing get/call/close cycles never see
//! more than `max_active` engines checked out, and finish without deadlock
//! or counter corruption.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use engine_pool::{Engine, EngineFactory, Pool, Result, Value};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

struct StressEngine {
    id: usize,
}

impl Engine for StressEngine {
    async fn execute(&mut self, _command: &str, _args: &[Value]) -> Result<Value> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(Value::from(self.id))
    }
}

#[derive(Default)]
struct StressFactory {
    create_count: Arc<AtomicUsize>,
}

impl EngineFactory for StressFactory {
    type Engine = StressEngine;

    async fn create(&self) -> Result<StressEngine> {
        let id = self.create_count.fetch_add(1, Ordering::SeqCst);
        // Simulate interpreter start-up latency
        tokio::time::sleep(Duration::from_micros(100)).await;
        Ok(StressEngine { id })
    }
}

/// Live-handle gauge that remembers its high-water mark.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// 50 tasks x 20 cycles over ten engines
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_50_tasks_get_call_close() {
    init_tracing();

    let max = 10;
    let factory = StressFactory::default();
    let create_count = Arc::clone(&factory.create_count);
    let pool = Pool::new(factory, max).unwrap();
    let gauge = Arc::new(Gauge::default());
    let success_count = Arc::new(AtomicUsize::new(0));
    let mut set = JoinSet::new();

    for _ in 0..50 {
        let pool = pool.clone();
        let gauge = Arc::clone(&gauge);
        let success_count = Arc::clone(&success_count);
        set.spawn(async move {
            for _ in 0..20 {
                let mut conn = pool.get().await;
                assert!(conn.is_active(), "waiting get should always succeed");
                gauge.enter();
                conn.do_call("tick", &[]).await.expect("call should succeed");
                gauge.leave();
                conn.close().await.unwrap();
            }
            success_count.fetch_add(1, Ordering::SeqCst);
        });
    }

    // Safety net against deadlock
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while let Some(result) = tokio::time::timeout_at(deadline, set.join_next())
        .await
        .expect("stress test should not deadlock (30s timeout)")
    {
        result.expect("task should not panic");
    }

    assert_eq!(success_count.load(Ordering::SeqCst), 50);
    assert!(
        gauge.peak.load(Ordering::SeqCst) <= max,
        "peak live handles ({}) exceeded max_active ({max})",
        gauge.peak.load(Ordering::SeqCst),
    );

    let stats = pool.stats();
    assert!(stats.active_count <= max);
    assert_eq!(stats.active_count, stats.idle_count, "nothing is checked out");
    assert!(stats.wait_count > 0, "50 tasks over 10 engines must wait");

    let created = create_count.load(Ordering::SeqCst);
    assert!(created <= max, "created {created} engines, max is {max}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_close_during_contention() {
    init_tracing();

    let pool = Pool::new(StressFactory::default(), 4).unwrap();
    let mut set = JoinSet::new();

    for _ in 0..32 {
        let pool = pool.clone();
        set.spawn(async move {
            loop {
                let mut conn = pool.get().await;
                if !conn.is_active() {
                    return;
                }
                let _ = conn.do_call("tick", &[]).await;
                conn.close().await.unwrap();
            }
        });
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.close().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while let Some(result) = tokio::time::timeout_at(deadline, set.join_next())
        .await
        .expect("every task should observe the closed pool")
    {
        result.expect("task should not panic");
    }

    // Give spawned destroys a moment to settle
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = pool.stats();
    assert_eq!(stats.active_count, 0);
    assert_eq!(stats.idle_count, 0);
}
