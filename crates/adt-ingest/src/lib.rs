//! Message consumer for the ADT state engine.
//!
//! Reads normalised ADT messages from a [`MessageSource`], applies each one
//! through an [`AdtStore`](adt_core::store::AdtStore), records its outcome
//! and only then acknowledges it.

pub mod consumer;
pub mod error;
pub mod source;

pub use consumer::{Consumer, Summary};
pub use error::{Error, Result};
pub use source::{Delivery, JsonLinesSource, MemorySource, MessageSource};

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `ADT_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
  pub store_path:       PathBuf,
  /// JSON-lines file of normalised messages.
  pub input_path:       PathBuf,
  #[serde(default = "default_retry_backoff_ms")]
  pub retry_backoff_ms: u64,
  #[serde(default = "default_max_retries")]
  pub max_retries:      u32,
}

fn default_retry_backoff_ms() -> u64 { 1_000 }

fn default_max_retries() -> u32 { 5 }

impl IngestConfig {
  pub fn retry_backoff(&self) -> Duration { Duration::from_millis(self.retry_backoff_ms) }
}
