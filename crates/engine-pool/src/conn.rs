//! Handles returned by [`Pool::get`](crate::Pool::get)

use crate::engine::{Engine, EngineFactory, Value};
use crate::error::{Error, Result};
use crate::pool::{Pool, PoolConn};

/// Caller-facing handle for one checkout.
///
/// Either bound to a checked-out engine or carrying the error that prevented
/// the checkout. Both answer [`do_call`](Self::do_call) and
/// [`close`](Self::close), so callers can defer error handling to their first
/// call.
pub enum Conn<F: EngineFactory> {
    /// Bound to a checked-out engine.
    Active(ActiveConn<F>),
    /// Acquisition failed; every call returns the stored error.
    Failed(ErrorConn),
}

impl<F: EngineFactory> Conn<F> {
    /// Run `command` on the bound engine.
    pub async fn do_call(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        match self {
            Self::Active(conn) => conn.do_call(command, args).await,
            Self::Failed(conn) => conn.do_call(command, args),
        }
    }

    /// Return the engine to the pool. Further calls fail with
    /// [`Error::HandleClosed`]; closing again is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        match self {
            Self::Active(conn) => conn.close().await,
            Self::Failed(conn) => conn.close(),
        }
    }

    /// Whether this handle is bound to an engine (open or already closed).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// The acquisition error, if this handle failed.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Active(_) => None,
            Self::Failed(conn) => Some(conn.error()),
        }
    }

    /// Convert into the active handle, or the acquisition error.
    pub fn into_result(self) -> Result<ActiveConn<F>> {
        match self {
            Self::Active(conn) => Ok(conn),
            Self::Failed(conn) => Err(conn.into_error()),
        }
    }
}

impl<F: EngineFactory> std::fmt::Debug for Conn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active(conn) => f.debug_tuple("Active").field(conn).finish(),
            Self::Failed(conn) => f.debug_tuple("Failed").field(conn).finish(),
        }
    }
}

/// Handle bound to one checked-out engine.
///
/// Dropping an open handle returns its engine to the pool, the same as
/// [`close`](Self::close).
pub struct ActiveConn<F: EngineFactory> {
    pool: Pool<F>,
    conn: Option<PoolConn<F::Engine>>,
}

impl<F: EngineFactory> ActiveConn<F> {
    pub(crate) fn new(pool: Pool<F>, conn: PoolConn<F::Engine>) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }

    /// Run `command` on the bound engine.
    pub async fn do_call(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        let conn = self.conn.as_mut().ok_or(Error::HandleClosed)?;
        conn.engine.execute(command, args).await
    }

    /// Return the engine to the pool's idle list.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            self.pool.put(conn, false).await;
        }
        Ok(())
    }

    /// Destroy the engine instead of returning it, e.g. after it was left in
    /// an unusable state. The admission permit is still handed back.
    pub async fn force_close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            self.pool.put(conn, true).await;
        }
        Ok(())
    }

    /// Whether [`close`](Self::close) or [`force_close`](Self::force_close)
    /// has been called.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// The bound engine, until the handle is closed.
    pub fn engine(&self) -> Option<&F::Engine> {
        self.conn.as_ref().map(|conn| &conn.engine)
    }

    /// Mutable access to the bound engine, until the handle is closed.
    pub fn engine_mut(&mut self) -> Option<&mut F::Engine> {
        self.conn.as_mut().map(|conn| &mut conn.engine)
    }

    /// The pool this handle was checked out from.
    pub fn pool(&self) -> &Pool<F> {
        &self.pool
    }
}

impl<F: EngineFactory> Drop for ActiveConn<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_detached(conn, false);
        }
    }
}

impl<F: EngineFactory> std::fmt::Debug for ActiveConn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConn")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handle for a failed acquisition.
#[derive(Debug, Clone)]
pub struct ErrorConn {
    err: Error,
}

impl ErrorConn {
    pub(crate) fn new(err: Error) -> Self {
        Self { err }
    }

    /// Always returns the stored error.
    pub fn do_call(&self, _command: &str, _args: &[Value]) -> Result<Value> {
        Err(self.err.clone())
    }

    /// No-op.
    pub fn close(&self) -> Result<()> {
        Ok(())
    }

    /// The stored error.
    pub fn error(&self) -> &Error {
        &self.err
    }

    /// Take the stored error.
    pub fn into_error(self) -> Error {
        self.err
    }
}
