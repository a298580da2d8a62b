//! Core types and trait definitions for the ADT state engine.
//!
//! This crate is free of database and runtime dependencies. It defines the
//! closed set of inbound ADT messages, the read models the engine maintains,
//! and the [`store::AdtStore`] abstraction that backends implement.

pub mod error;
pub mod field;
pub mod identity;
pub mod message;
pub mod outcome;
pub mod store;
pub mod visit;

pub use error::{Error, Result};
pub use field::FieldValue;
