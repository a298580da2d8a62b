//! SQLite backend for the ADT state engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The engine itself is
//! synchronous code over a [`rusqlite::Connection`], run inside one
//! transaction per message.

mod dispatch;
mod encode;
mod identity;
mod location;
mod planned;
mod row_state;
mod schema;
mod store;
mod visit;

pub mod error;

pub use error::{Error, Result};
pub use store::{AuditTable, SqliteStore};

#[cfg(test)]
mod tests;
