//! Engine traits consumed by the pool
//!
//! An [`Engine`] is one embedded interpreter instance. An [`EngineFactory`]
//! knows how to build and prepare engines. The pool never looks inside an
//! engine: it only creates, sets up, executes on and closes them.

use std::future::Future;

use crate::error::Result;

/// Value type passed to and returned from engine commands.
pub type Value = serde_json::Value;

/// A pooled interpreter instance.
pub trait Engine: Send + 'static {
    /// Execute `command` with `args` and return its reply.
    fn execute(
        &mut self,
        command: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Release the engine's resources.
    ///
    /// Must not block indefinitely. Failures are logged by the pool and never
    /// reach a caller.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized,
    {
        async move {
            drop(self);
            Ok(())
        }
    }
}

/// Builds engines for a [`Pool`](crate::Pool).
pub trait EngineFactory: Send + Sync + 'static {
    /// The engine type produced by this factory.
    type Engine: Engine;

    /// Create a fresh engine instance.
    fn create(&self) -> impl Future<Output = Result<Self::Engine>> + Send;

    /// One-time preparation of a freshly created engine, such as extending
    /// its module search path or registering native callables.
    ///
    /// Runs once per engine, right after [`create`](Self::create). A failure
    /// counts as a creation failure.
    fn setup(&self, _engine: &mut Self::Engine) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
