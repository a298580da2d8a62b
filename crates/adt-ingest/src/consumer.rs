//! The consume loop: read, process, record the outcome, acknowledge.
//!
//! A delivery is acknowledged only after its outcome has been recorded.
//! Processing failures of any kind are outcomes, not loop failures; the loop
//! stops only when the source or the outcome store stays unavailable
//! through every retry.

use std::{fmt::Display, time::Duration};

use adt_core::{
  message::AdtMessage,
  outcome::{MessageOutcome, OutcomeStatus},
  store::AdtStore,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
  source::{Delivery, MessageSource},
  Error, Result,
};

/// Outcome tallies of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
  pub processed: u64,
  pub ignored:   u64,
  pub errors:    u64,
}

impl Summary {
  fn record(&mut self, status: OutcomeStatus) {
    match status {
      OutcomeStatus::Processed => self.processed += 1,
      OutcomeStatus::Ignored => self.ignored += 1,
      _ => self.errors += 1,
    }
  }
}

/// Fixed-backoff retry budget for one operation.
struct Retry {
  backoff:     Duration,
  max_retries: u32,
  attempt:     u32,
}

impl Retry {
  /// Wait out the backoff and return `true`, or `false` once the budget is
  /// spent.
  async fn again(&mut self, what: &str, error: &(impl Display + Sync)) -> bool {
    if self.attempt >= self.max_retries {
      tracing::error!(error = %error, attempts = self.attempt + 1, "{what} failed; giving up");
      return false;
    }
    self.attempt += 1;
    tracing::warn!(error = %error, attempt = self.attempt, "{what} failed; retrying");
    tokio::time::sleep(self.backoff).await;
    true
  }
}

/// Drives messages from a [`MessageSource`] through an [`AdtStore`].
pub struct Consumer<S, Q> {
  store:       S,
  source:      Q,
  backoff:     Duration,
  max_retries: u32,
}

impl<S: AdtStore, Q: MessageSource> Consumer<S, Q> {
  pub fn new(store: S, source: Q) -> Self {
    Self { store, source, backoff: Duration::from_secs(1), max_retries: 5 }
  }

  pub fn with_retry(mut self, backoff: Duration, max_retries: u32) -> Self {
    self.backoff = backoff;
    self.max_retries = max_retries;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn source(&self) -> &Q { &self.source }

  fn retry(&self) -> Retry {
    Retry { backoff: self.backoff, max_retries: self.max_retries, attempt: 0 }
  }

  /// Consume until the source is exhausted.
  pub async fn run(&mut self) -> Result<Summary> {
    let mut summary = Summary::default();
    while let Some(delivery) = self.next_delivery().await? {
      let outcome = self.handle(&delivery).await?;
      summary.record(outcome.status);
      self.acknowledge(delivery.tag).await?;
    }
    tracing::info!(
      processed = summary.processed,
      ignored = summary.ignored,
      errors = summary.errors,
      "message source exhausted"
    );
    Ok(summary)
  }

  async fn next_delivery(&mut self) -> Result<Option<Delivery>> {
    let mut retry = self.retry();
    loop {
      let error = match self.source.next().await {
        Ok(delivery) => return Ok(delivery),
        Err(e) => e,
      };
      if !retry.again("reading from the message source", &error).await {
        return Err(Error::from_source(error));
      }
    }
  }

  async fn acknowledge(&mut self, tag: u64) -> Result<()> {
    let mut retry = self.retry();
    loop {
      let error = match self.source.ack(tag).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
      };
      if !retry.again("acknowledging a delivery", &error).await {
        return Err(Error::from_source(error));
      }
    }
  }

  /// Process one delivery and return its recorded outcome.
  async fn handle(&self, delivery: &Delivery) -> Result<MessageOutcome> {
    let message = match AdtMessage::from_json(&delivery.body) {
      Ok(message) => message,
      Err(e) => return self.reject(delivery, e).await,
    };

    let mut retry = self.retry();
    loop {
      let error = match self.store.process_message(message.clone()).await {
        Ok(outcome) => return Ok(outcome),
        Err(e) => e,
      };
      if !retry.again("recording a message outcome", &error).await {
        return Err(Error::from_store(error));
      }
    }
  }

  /// Record a delivery that is not a message at all.
  async fn reject(&self, delivery: &Delivery, error: adt_core::Error) -> Result<MessageOutcome> {
    tracing::error!(tag = delivery.tag, error = %error, "undecodable message");
    let now = Utc::now();
    let outcome = MessageOutcome {
      outcome_id:         Uuid::new_v4(),
      source_message_id:  format!("delivery {}", delivery.tag),
      message_type:       "undecodable".into(),
      message_datetime:   now,
      status:             OutcomeStatus::Failed,
      error_message:      Some(error.to_string()),
      processing_started: now,
      duration_micros:    0,
    };

    let mut retry = self.retry();
    loop {
      let error = match self.store.record_outcome(outcome.clone()).await {
        Ok(()) => return Ok(outcome),
        Err(e) => e,
      };
      if !retry.again("recording a message outcome", &error).await {
        return Err(Error::from_store(error));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use adt_store_sqlite::SqliteStore;
  use serde_json::json;

  use super::*;
  use crate::source::MemorySource;

  fn message(kind: &str, id: &str, minute: u32, extra: serde_json::Value) -> String {
    let mut body = json!({
      "type": kind,
      "source_message_id": id,
      "source_system": "EPIC",
      "mrn": "M1",
      "visit_number": "E1",
      "recorded_datetime": format!("2022-05-01T08:{minute:02}:00Z"),
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
      body.extend(extra.clone());
    }
    body.to_string()
  }

  fn admit(id: &str, minute: u32) -> String {
    message("admit_patient", id, minute, json!({ "full_location_string": "L1" }))
  }

  fn transfer(id: &str, minute: u32, location: Option<&str>) -> String {
    message("transfer_patient", id, minute, json!({ "full_location_string": location }))
  }

  async fn consumer(bodies: Vec<String>) -> Consumer<SqliteStore, MemorySource> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Consumer::new(store, MemorySource::new(bodies)).with_retry(Duration::ZERO, 2)
  }

  #[tokio::test]
  async fn every_delivery_is_recorded_then_acknowledged() {
    let mut c = consumer(vec![
      admit("m1", 0),
      transfer("m2", 10, None),
      transfer("m3", 20, Some("L2")),
      message("cancel_admit_patient", "m4", 30, json!({})),
    ])
    .await;

    let summary = c.run().await.unwrap();
    assert_eq!(summary, Summary { processed: 2, ignored: 1, errors: 1 });
    assert_eq!(c.source().acked(), &[1, 2, 3, 4]);

    let outcomes = c.store().outcomes().await.unwrap();
    let statuses: Vec<_> =
      outcomes.iter().map(|o| (o.source_message_id.as_str(), o.status)).collect();
    assert_eq!(
      statuses,
      vec![
        ("m1", OutcomeStatus::Processed),
        ("m2", OutcomeStatus::Ignored),
        ("m3", OutcomeStatus::Processed),
        ("m4", OutcomeStatus::RequiredDataMissing),
      ]
    );
  }

  #[tokio::test]
  async fn undecodable_delivery_does_not_stop_the_loop() {
    let mut c = consumer(vec!["not json".into(), admit("m1", 0)]).await;

    let summary = c.run().await.unwrap();
    assert_eq!(summary, Summary { processed: 1, ignored: 0, errors: 1 });
    assert_eq!(c.source().acked(), &[1, 2]);

    let outcomes = c.store().outcomes().await.unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(outcomes[0].message_type, "undecodable");
  }

  #[tokio::test]
  async fn source_outage_is_retried() {
    let mut c = consumer(vec![admit("m1", 0)]).await;
    c.source.fail_next(2);

    let summary = c.run().await.unwrap();
    assert_eq!(summary.processed, 1);
  }

  #[tokio::test]
  async fn persistent_source_outage_stops_the_loop() {
    let mut c = consumer(vec![admit("m1", 0)]).await;
    c.source.fail_next(3);

    assert!(matches!(c.run().await, Err(Error::Source(_))));
    assert!(c.source().acked().is_empty());
  }
}
