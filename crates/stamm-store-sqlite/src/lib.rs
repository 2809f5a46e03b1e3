//! SQLite backend for the Stamm master-data store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Cascades run synchronously on that
//! thread inside one `rusqlite` transaction.

mod encode;
mod gateway;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use gateway::SqlGateway;
pub use store::SqliteStore;
