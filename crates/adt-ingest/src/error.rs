//! Error types for `adt-ingest`.

use thiserror::Error;

/// Failures that stop the consumer. Per-message processing failures never
/// surface here; they are recorded as outcomes.
#[derive(Debug, Error)]
pub enum Error {
  #[error("message source error: {0}")]
  Source(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn from_source(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }

  pub fn from_store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
