//! Bounded, shared pool of interpreter engines.
//!
//! `Pool<F>` creates engines through an [`EngineFactory`], keeps returned
//! engines on an idle list for warm reuse, and bounds the number of
//! checked-out engines with an admission semaphore when waiting is enabled.

pub mod config;
mod idle;

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Semaphore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::conn::{ActiveConn, Conn, ErrorConn};
use crate::engine::{Engine, EngineFactory};
use crate::error::{Error, Result};

pub use config::PoolConfig;
pub(crate) use idle::PoolConn;
use idle::IdleList;

/// Snapshot of pool usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStats {
    /// Engines created and not yet destroyed (idle + checked out).
    pub active_count: usize,
    /// Engines waiting on the idle list.
    pub idle_count: usize,
    /// Number of `get` calls that had to wait for a permit.
    pub wait_count: u64,
    /// Total time spent waiting for permits.
    pub wait_duration: Duration,
}

/// Mutable pool state, guarded by one lock.
struct PoolState<E> {
    closed: bool,
    active: usize,
    idle: IdleList<PoolConn<E>>,
    wait_count: u64,
    wait_duration: Duration,
}

struct PoolInner<F: EngineFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<F::Engine>>,
    /// Admission permits, one per checked-out engine. Initialised on the
    /// first waiting `get`, and only while the state lock is held.
    semaphore: OnceLock<Semaphore>,
}

impl<F: EngineFactory> PoolInner<F> {
    /// Hand one permit back unless the pool is closed.
    fn release_permit(&self, state: &PoolState<F::Engine>) {
        if !state.closed {
            if let Some(semaphore) = self.semaphore.get() {
                semaphore.add_permits(1);
            }
        }
    }

    /// Bookkeeping after an engine left the pool for good.
    fn finish_destroy(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        self.release_permit(&state);
    }
}

/// Bounded pool of interpreter engines.
///
/// Cloning is cheap; all clones share the same engines and counters.
pub struct Pool<F: EngineFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: EngineFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: EngineFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: EngineFactory> Pool<F> {
    /// Create a pool holding up to `max_connections` engines that waits when
    /// all of them are checked out.
    ///
    /// # Errors
    /// Returns error if `max_connections` is zero.
    pub fn new(factory: F, max_connections: usize) -> Result<Self> {
        Self::with_config(factory, PoolConfig::with_max_connections(max_connections))
    }

    /// Create a pool from an explicit configuration.
    ///
    /// # Errors
    /// Returns error if `config` is invalid.
    pub fn with_config(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let idle = IdleList::with_capacity(config.max_idle);
        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                state: Mutex::new(PoolState {
                    closed: false,
                    active: 0,
                    idle,
                    wait_count: 0,
                    wait_duration: Duration::ZERO,
                }),
                semaphore: OnceLock::new(),
            }),
        })
    }

    /// The configuration this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Create engines until the idle list holds `max_idle` of them.
    ///
    /// Meant to be called once before the pool is shared. Stops at the first
    /// factory error; engines created before it stay idle.
    pub async fn warm_up(&self) -> Result<()> {
        let inner = &self.inner;
        loop {
            {
                let state = inner.state.lock();
                if state.closed {
                    return Err(Error::PoolClosed);
                }
                if state.idle.len() >= inner.config.max_idle {
                    break;
                }
            }

            let engine = self.create_engine().await?;

            let mut state = inner.state.lock();
            if state.closed {
                drop(state);
                drop(engine);
                return Err(Error::PoolClosed);
            }
            state.active += 1;
            state.idle.push_front(PoolConn::new(engine));
        }

        let stats = self.stats();
        tracing::info!(
            active = stats.active_count,
            idle = stats.idle_count,
            "Engine pool warmed up"
        );
        Ok(())
    }

    /// Check an engine out of the pool.
    ///
    /// Never fails directly: errors come back as [`Conn::Failed`], which
    /// answers every call with the captured error.
    pub async fn get(&self) -> Conn<F> {
        match self.checkout().await {
            Ok(conn) => Conn::Active(ActiveConn::new(self.clone(), conn)),
            Err(err) => Conn::Failed(ErrorConn::new(err)),
        }
    }

    async fn checkout(&self) -> Result<PoolConn<F::Engine>> {
        let inner = &self.inner;
        let waited = self.wait_vacant().await?;

        {
            let mut state = inner.state.lock();
            if let Some(waited) = waited {
                state.wait_count += 1;
                state.wait_duration += waited;
            }

            if let Some(conn) = state.idle.pop_front() {
                tracing::debug!(idle = state.idle.len(), "Reusing idle engine");
                return Ok(conn);
            }

            if state.closed {
                return Err(Error::PoolClosed);
            }

            let max_active = inner.config.max_active;
            if !inner.config.wait && max_active > 0 && state.active >= max_active {
                return Err(Error::PoolExhausted {
                    active: state.active,
                    max_active,
                });
            }

            state.active += 1;
        }

        // Rolls back the slot taken above if creation fails or this future
        // is dropped before creation finishes.
        let reservation = Reservation {
            inner: inner.as_ref(),
            armed: true,
        };
        match self.create_engine().await {
            Ok(engine) => {
                reservation.commit();
                tracing::debug!("Created new engine");
                Ok(PoolConn::new(engine))
            }
            Err(err) => {
                drop(reservation);
                tracing::warn!(error = %err, "Engine creation failed");
                Err(err)
            }
        }
    }

    /// Take one admission permit, waiting for it if needed.
    ///
    /// Returns how long the caller waited, or `None` if a permit was free.
    async fn wait_vacant(&self) -> Result<Option<Duration>> {
        let config = &self.inner.config;
        if !config.uses_semaphore() {
            return Ok(None);
        }

        let semaphore = self.semaphore();
        let start = (semaphore.available_permits() == 0).then(Instant::now);

        let acquired = match config.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, semaphore.acquire())
                .await
                .map_err(|_| Error::AcquireTimeout {
                    timeout_ms: millis(timeout),
                })?,
            None => semaphore.acquire().await,
        };
        let permit = acquired.map_err(|_| Error::PoolClosed)?;
        // Handed back by `put` when the engine is returned.
        permit.forget();

        Ok(start.map(|start| start.elapsed()))
    }

    fn semaphore(&self) -> &Semaphore {
        let inner = &self.inner;
        if let Some(semaphore) = inner.semaphore.get() {
            return semaphore;
        }
        let state = inner.state.lock();
        inner.semaphore.get_or_init(|| {
            if state.closed {
                let semaphore = Semaphore::new(0);
                semaphore.close();
                semaphore
            } else {
                Semaphore::new(inner.config.max_active)
            }
        })
    }

    async fn create_engine(&self) -> Result<F::Engine> {
        let factory = &self.inner.factory;
        let mut engine = factory.create().await?;
        if let Err(err) = factory.setup(&mut engine).await {
            if let Err(close_err) = engine.close().await {
                tracing::warn!(error = %close_err, "Failed to close engine after setup error");
            }
            return Err(err);
        }
        Ok(engine)
    }

    /// Return a checked-out engine, destroying it when the pool is closed,
    /// `force_close` is set, or idle capacity overflows.
    pub(crate) async fn put(&self, conn: PoolConn<F::Engine>, force_close: bool) {
        if let Some(doomed) = self.release(conn, force_close) {
            self.destroy(doomed).await;
        }
    }

    /// [`put`](Self::put) for callers that cannot await, such as `Drop`.
    pub(crate) fn put_detached(&self, conn: PoolConn<F::Engine>, force_close: bool) {
        let Some(doomed) = self.release(conn, force_close) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                // Settles the counters even if the task is dropped unpolled.
                let finish = DestroyGuard {
                    inner: Arc::clone(&self.inner),
                };
                drop(runtime.spawn(close_engine(doomed, finish)));
            }
            Err(_) => {
                drop(doomed);
                self.inner.finish_destroy();
            }
        }
    }

    /// Lock-held part of a return. Yields the entry that must be destroyed,
    /// if any; otherwise the permit has already been handed back.
    fn release(
        &self,
        conn: PoolConn<F::Engine>,
        force_close: bool,
    ) -> Option<PoolConn<F::Engine>> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let doomed = if !state.closed && !force_close {
            state.idle.push_front(conn);
            if state.idle.len() > inner.config.max_idle {
                state.idle.pop_back()
            } else {
                None
            }
        } else {
            Some(conn)
        };

        if doomed.is_none() {
            tracing::debug!(idle = state.idle.len(), "Engine returned to idle list");
            inner.release_permit(&state);
        }
        doomed
    }

    async fn destroy(&self, conn: PoolConn<F::Engine>) {
        let finish = DestroyGuard {
            inner: Arc::clone(&self.inner),
        };
        close_engine(conn, finish).await;
    }

    /// Current usage snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            active_count: state.active,
            idle_count: state.idle.len(),
            wait_count: state.wait_count,
            wait_duration: state.wait_duration,
        }
    }

    /// Engines created and not yet destroyed.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Engines available for immediate reuse.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Close the pool. Idempotent.
    ///
    /// Idle engines are dropped without [`Engine::close`]; the host process
    /// reclaims them. Every caller waiting in [`get`](Self::get) fails with
    /// [`Error::PoolClosed`]. Checked-out engines are destroyed when their
    /// handles are closed.
    pub fn close(&self) -> Result<()> {
        let inner = &self.inner;
        let discarded: Vec<_> = {
            let mut state = inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            let idle = state.idle.len();
            state.active = state.active.saturating_sub(idle);
            if let Some(semaphore) = inner.semaphore.get() {
                semaphore.close();
            }
            state.idle.drain().collect()
        };

        tracing::info!(
            discarded = discarded.len(),
            active = self.active_count(),
            "Engine pool closed"
        );
        drop(discarded);
        Ok(())
    }
}

/// Slot taken for an engine that is still being created.
struct Reservation<'a, F: EngineFactory> {
    inner: &'a PoolInner<F>,
    armed: bool,
}

impl<F: EngineFactory> Reservation<'_, F> {
    fn commit(mut self) {
        self.armed = false;
    }
}

impl<F: EngineFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.finish_destroy();
        }
    }
}

/// Runs destroy bookkeeping even if the close future is dropped.
struct DestroyGuard<F: EngineFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: EngineFactory> Drop for DestroyGuard<F> {
    fn drop(&mut self) {
        self.inner.finish_destroy();
    }
}

/// Close an engine that left the pool for good. `finish` settles the
/// active count and the permit once this future completes or is dropped.
async fn close_engine<F: EngineFactory>(conn: PoolConn<F::Engine>, finish: DestroyGuard<F>) {
    let age_ms = millis(conn.created_at.elapsed());
    match conn.engine.close().await {
        Ok(()) => tracing::debug!(age_ms, "Engine destroyed"),
        Err(err) => tracing::warn!(error = %err, age_ms, "Engine close failed"),
    }
    drop(finish);
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoEngine {
        id: usize,
    }

    impl Engine for EchoEngine {
        async fn execute(&mut self, command: &str, args: &[Value]) -> Result<Value> {
            Ok(serde_json::json!({ "engine": self.id, "command": command, "args": args }))
        }
    }

    #[derive(Default)]
    struct EchoFactory {
        created: AtomicUsize,
    }

    impl EngineFactory for EchoFactory {
        type Engine = EchoEngine;

        async fn create(&self) -> Result<EchoEngine> {
            Ok(EchoEngine {
                id: self.created.fetch_add(1, Ordering::SeqCst),
            })
        }
    }

    fn engine_id(conn: &Conn<EchoFactory>) -> usize {
        match conn {
            Conn::Active(active) => active.engine().expect("open handle").id,
            Conn::Failed(failed) => panic!("expected active handle, got {:?}", failed.error()),
        }
    }

    #[test]
    fn new_rejects_zero_connections() {
        let err = Pool::new(EchoFactory::default(), 0).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn get_creates_then_reuses() {
        let pool = Pool::new(EchoFactory::default(), 2).unwrap();

        let mut conn = pool.get().await;
        assert!(conn.is_active());
        assert_eq!(engine_id(&conn), 0);
        conn.close().await.unwrap();
        assert_eq!(pool.idle_count(), 1);

        let conn = pool.get().await;
        assert_eq!(engine_id(&conn), 0, "idle engine should be reused");
        assert_eq!(pool.inner.factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.active_count(), 1);
    }

    #[tokio::test]
    async fn most_recently_returned_engine_is_served_first() {
        let pool = Pool::new(EchoFactory::default(), 3).unwrap();
        let mut a = pool.get().await;
        let mut b = pool.get().await;
        a.close().await.unwrap();
        b.close().await.unwrap();

        let c = pool.get().await;
        assert_eq!(engine_id(&c), 1);
    }

    #[tokio::test]
    async fn idle_overflow_trims_coldest_engine() {
        let config = PoolConfig::with_max_connections(3).with_max_idle(1);
        let pool = Pool::with_config(EchoFactory::default(), config).unwrap();

        let mut a = pool.get().await;
        let mut b = pool.get().await;
        assert_eq!(pool.active_count(), 2);

        a.close().await.unwrap();
        b.close().await.unwrap();

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.active_count(), 1);
        // `a` went idle first, so it was the one trimmed.
        let c = pool.get().await;
        assert_eq!(engine_id(&c), 1);
    }

    #[tokio::test]
    async fn stats_snapshot_matches_accessors() {
        let pool = Pool::new(EchoFactory::default(), 2).unwrap();
        pool.warm_up().await.unwrap();
        let _conn = pool.get().await;

        let stats = pool.stats();
        assert_eq!(stats.active_count, pool.active_count());
        assert_eq!(stats.idle_count, pool.idle_count());
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.idle_count, 1);
        assert_eq!(stats.wait_count, 0);
        assert_eq!(stats.wait_duration, Duration::ZERO);
    }

    #[tokio::test]
    async fn dropped_handle_returns_engine() {
        let pool = Pool::new(EchoFactory::default(), 1).unwrap();
        {
            let _conn = pool.get().await;
        }
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.active_count(), 1);

        // The permit came back too, so this does not wait.
        let conn = tokio::time::timeout(Duration::from_secs(1), pool.get())
            .await
            .expect("permit should be free");
        assert!(conn.is_active());
    }

    #[test]
    fn semaphore_created_closed_after_pool_close() {
        let pool = Pool::new(EchoFactory::default(), 2).unwrap();
        pool.close().unwrap();
        let semaphore = pool.semaphore();
        assert!(semaphore.is_closed());
    }

    #[tokio::test]
    async fn warm_up_on_closed_pool_fails() {
        let pool = Pool::new(EchoFactory::default(), 2).unwrap();
        pool.close().unwrap();
        let err = pool.warm_up().await.unwrap_err();
        assert!(matches!(err, Error::PoolClosed));
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn millis_saturates_instead_of_truncating() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn warm_up_tops_up_to_max_idle() {
        let pool = Pool::new(EchoFactory::default(), 3).unwrap();
        let mut conn = pool.get().await;
        conn.close().await.unwrap();

        pool.warm_up().await.unwrap();
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.inner.factory.created.load(Ordering::SeqCst), 3);
    }
}
