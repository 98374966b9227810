//! # Engine Pool
//!
//! Bounded pool of expensive, stateful interpreter engines shared by
//! concurrent callers. Each caller checks an engine out with [`Pool::get`],
//! runs one unit of work through the returned [`Conn`], and closes it to put
//! the engine back.
//!
//! Engines are created through an [`EngineFactory`]. The pool keeps returned
//! engines on an idle list, bounds concurrent checkouts with an admission
//! semaphore when waiting is enabled, and reports usage via [`PoolStats`].

pub mod conn;
pub mod engine;
pub mod error;
pub mod pool;
pub mod script_log;
pub mod setup;

pub use conn::{ActiveConn, Conn, ErrorConn};
pub use engine::{Engine, EngineFactory, Value};
pub use error::{Error, Result};
pub use pool::{Pool, PoolConfig, PoolStats};
pub use script_log::LogLevel;
pub use setup::SearchPath;
