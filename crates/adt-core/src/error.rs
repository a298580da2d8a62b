//! Error types for `adt-core`.
//!
//! The first three variants are the domain taxonomy: each one means the
//! message was understood but cannot be applied, so it is skipped rather
//! than retried.

use thiserror::Error;

use crate::outcome::OutcomeStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// The message lacks something its kind needs, or its effect has been
  /// cancelled already.
  #[error("message ignored: {0}")]
  MessageIgnored(String),

  /// The message is ambiguous and the engine refuses to guess.
  #[error("required data missing: {0}")]
  RequiredDataMissing(String),

  /// Stored state contradicts what the message asserts.
  #[error("incompatible database state: {0}")]
  IncompatibleDatabaseState(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn ignored(msg: impl Into<String>) -> Self { Self::MessageIgnored(msg.into()) }

  pub fn missing(msg: impl Into<String>) -> Self { Self::RequiredDataMissing(msg.into()) }

  pub fn incompatible(msg: impl Into<String>) -> Self {
    Self::IncompatibleDatabaseState(msg.into())
  }

  /// The outcome status a message failing with this error is reported under.
  pub fn status(&self) -> OutcomeStatus {
    match self {
      Self::MessageIgnored(_) => OutcomeStatus::Ignored,
      Self::RequiredDataMissing(_) => OutcomeStatus::RequiredDataMissing,
      Self::IncompatibleDatabaseState(_) => OutcomeStatus::IncompatibleDatabaseState,
      Self::Serialization(_) => OutcomeStatus::Failed,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
