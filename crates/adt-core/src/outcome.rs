//! Per-message outcome records.
//!
//! Every consumed message yields exactly one [`MessageOutcome`], written
//! before the message is acknowledged to its source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How processing of one message ended.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
  /// Committed; includes ignorable no-ops such as duplicates.
  Processed,
  Ignored,
  RequiredDataMissing,
  IncompatibleDatabaseState,
  /// Anything unexpected. The transaction was rolled back.
  Failed,
}

impl OutcomeStatus {
  /// Whether the outcome counts as an error for operational purposes.
  /// Ignored messages do not.
  pub fn is_error(self) -> bool { !matches!(self, Self::Processed | Self::Ignored) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOutcome {
  pub outcome_id:         Uuid,
  pub source_message_id:  String,
  pub message_type:       String,
  pub message_datetime:   DateTime<Utc>,
  pub status:             OutcomeStatus,
  pub error_message:      Option<String>,
  pub processing_started: DateTime<Utc>,
  pub duration_micros:    i64,
}
