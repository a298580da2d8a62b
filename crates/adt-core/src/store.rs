//! The `AdtStore` trait.
//!
//! Implemented by storage backends (e.g. `adt-store-sqlite`). The ingest
//! loop depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  identity::{CoreDemographic, Mrn},
  message::AdtMessage,
  outcome::{MessageOutcome, OutcomeStatus},
  visit::{HospitalVisit, LocationVisit, PlannedMovement},
};

/// Abstraction over an ADT state engine backend.
///
/// Each call to [`AdtStore::process`] is atomic: either every mutation
/// implied by the message commits, or none does.
pub trait AdtStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Classify a processing error for the outcome record.
  fn status_of(error: &Self::Error) -> OutcomeStatus;

  // ── Processing ────────────────────────────────────────────────────────

  /// Apply one message in a single transaction. `stored_from` is the system
  /// time stamped on every row written and on every audit row's
  /// `stored_until`.
  fn process(
    &self,
    message: AdtMessage,
    stored_from: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Process a message at the current time and durably record its outcome.
  ///
  /// Domain and unexpected failures are captured in the returned outcome; an
  /// `Err` means the outcome itself could not be recorded and the message
  /// must not be acknowledged.
  fn process_message(
    &self,
    message: AdtMessage,
  ) -> impl Future<Output = Result<MessageOutcome, Self::Error>> + Send + '_;

  fn record_outcome(
    &self,
    outcome: MessageOutcome,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The live identifier reached from the identifier with this MRN.
  fn live_identity(
    &self,
    mrn: String,
  ) -> impl Future<Output = Result<Option<Mrn>, Self::Error>> + Send + '_;

  /// Demographics of the live identity of this MRN.
  fn demographics(
    &self,
    mrn: String,
  ) -> impl Future<Output = Result<Option<CoreDemographic>, Self::Error>> + Send + '_;

  fn hospital_visit(
    &self,
    encounter: String,
  ) -> impl Future<Output = Result<Option<HospitalVisit>, Self::Error>> + Send + '_;

  /// Location history of a visit, ordered by admission time with unknown
  /// admissions placed by their discharge time.
  fn location_visits(
    &self,
    encounter: String,
  ) -> impl Future<Output = Result<Vec<LocationVisit>, Self::Error>> + Send + '_;

  fn planned_movements(
    &self,
    encounter: String,
  ) -> impl Future<Output = Result<Vec<PlannedMovement>, Self::Error>> + Send + '_;

  fn outcomes(
    &self,
  ) -> impl Future<Output = Result<Vec<MessageOutcome>, Self::Error>> + Send + '_;
}
