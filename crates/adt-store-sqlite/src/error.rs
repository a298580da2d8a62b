//! Error type for `adt-store-sqlite`.

use adt_core::outcome::OutcomeStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] adt_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

impl Error {
  /// Domain errors keep their own classification; everything else is an
  /// unexpected failure.
  pub fn status(&self) -> OutcomeStatus {
    match self {
      Self::Core(e) => e.status(),
      _ => OutcomeStatus::Failed,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
