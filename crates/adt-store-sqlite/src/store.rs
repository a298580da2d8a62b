//! [`SqliteStore`], the SQLite implementation of [`AdtStore`].

use std::path::Path;

use adt_core::{
  identity::{CoreDemographic, Mrn},
  message::AdtMessage,
  outcome::{MessageOutcome, OutcomeStatus},
  store::AdtStore,
  visit::{HospitalVisit, LocationVisit, PlannedMovement},
};
use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::{
  dispatch,
  encode::{encode_dt, encode_uuid, RawOutcome, OUTCOME_COLUMNS},
  identity, location, planned,
  schema::SCHEMA,
  visit, Error, Result,
};

// ─── Audit tables ────────────────────────────────────────────────────────────

/// A live table with an audit twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTable {
  Mrn,
  MrnToLive,
  CoreDemographic,
  HospitalVisit,
  LocationVisit,
  PlannedMovement,
}

impl AuditTable {
  fn audit_table(self) -> &'static str {
    match self {
      Self::Mrn => "mrn_audit",
      Self::MrnToLive => "mrn_to_live_audit",
      Self::CoreDemographic => "core_demographic_audit",
      Self::HospitalVisit => "hospital_visit_audit",
      Self::LocationVisit => "location_visit_audit",
      Self::PlannedMovement => "planned_movement_audit",
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An ADT state engine backed by a single SQLite file.
///
/// Clones share one connection. All statements run on the connection's
/// single thread, and each message runs in its own `BEGIN IMMEDIATE`
/// transaction, so messages never interleave.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of superseded versions recorded in `table`'s audit twin.
  pub async fn audit_count(&self, table: AuditTable) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.audit_table());
    let count = self.conn.call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?)).await?;
    Ok(count)
  }

  /// `stored_until` of every audit row in `table`, oldest first.
  pub async fn audit_stored_until(&self, table: AuditTable) -> Result<Vec<String>> {
    let sql = format!("SELECT stored_until FROM {} ORDER BY rowid", table.audit_table());
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |r| r.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

// ─── AdtStore impl ───────────────────────────────────────────────────────────

impl AdtStore for SqliteStore {
  type Error = Error;

  fn status_of(error: &Error) -> OutcomeStatus { error.status() }

  // ── Processing ────────────────────────────────────────────────────────────

  async fn process(&self, message: AdtMessage, stored_from: DateTime<Utc>) -> Result<()> {
    let message = message.truncated_to_micros();
    let stored_from = stored_from.trunc_subsecs(6);
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let applied = dispatch::apply(&tx, &message, stored_from);
        if applied.is_ok() {
          tx.commit()?;
        }
        Ok(applied)
      })
      .await?
  }

  async fn process_message(&self, message: AdtMessage) -> Result<MessageOutcome> {
    let started = Utc::now();
    let source_message_id = message.header().source_message_id.clone();
    let message_type = message.kind().to_owned();
    let message_datetime = message.event_time().trunc_subsecs(6);

    let result = self.process(message, started).await;
    let (status, error_message) = match &result {
      Ok(()) => (OutcomeStatus::Processed, None),
      Err(e) => (e.status(), Some(e.to_string())),
    };
    match (&result, status) {
      (Ok(()), _) => {
        tracing::info!(source_message_id, message_type, "processed message");
      }
      (Err(e), OutcomeStatus::Failed) => {
        tracing::error!(source_message_id, message_type, error = %e, "message failed");
      }
      (Err(e), _) => {
        tracing::warn!(source_message_id, message_type, %status, error = %e, "message skipped");
      }
    }

    let outcome = MessageOutcome {
      outcome_id: Uuid::new_v4(),
      source_message_id,
      message_type,
      message_datetime,
      status,
      error_message,
      processing_started: started,
      duration_micros: (Utc::now() - started).num_microseconds().unwrap_or(i64::MAX),
    };
    self.record_outcome(outcome.clone()).await?;
    Ok(outcome)
  }

  async fn record_outcome(&self, outcome: MessageOutcome) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO message_outcome ({OUTCOME_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          ),
          rusqlite::params![
            encode_uuid(outcome.outcome_id),
            outcome.source_message_id,
            outcome.message_type,
            encode_dt(outcome.message_datetime),
            outcome.status.as_ref(),
            outcome.error_message,
            encode_dt(outcome.processing_started),
            outcome.duration_micros,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn live_identity(&self, mrn: String) -> Result<Option<Mrn>> {
    self.conn.call(move |conn| Ok(read_live_identity(conn, &mrn))).await?
  }

  async fn demographics(&self, mrn: String) -> Result<Option<CoreDemographic>> {
    self.conn.call(move |conn| Ok(read_demographics(conn, &mrn))).await?
  }

  async fn hospital_visit(&self, encounter: String) -> Result<Option<HospitalVisit>> {
    self
      .conn
      .call(move |conn| Ok(visit::find(conn, &encounter).map(|v| v.map(|(visit, _)| visit))))
      .await?
  }

  async fn location_visits(&self, encounter: String) -> Result<Vec<LocationVisit>> {
    self.conn.call(move |conn| Ok(read_location_visits(conn, &encounter))).await?
  }

  async fn planned_movements(&self, encounter: String) -> Result<Vec<PlannedMovement>> {
    self.conn.call(move |conn| Ok(read_planned_movements(conn, &encounter))).await?
  }

  async fn outcomes(&self) -> Result<Vec<MessageOutcome>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OUTCOME_COLUMNS} FROM message_outcome ORDER BY processing_started, rowid"
        ))?;
        let rows = stmt.query_map([], RawOutcome::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawOutcome::into_outcome).collect()
  }
}

// ─── Read helpers ────────────────────────────────────────────────────────────

fn read_live_identity(conn: &Connection, mrn: &str) -> Result<Option<Mrn>> {
  identity::find_by_mrn(conn, mrn)?
    .map(|found| identity::live_of(conn, &found))
    .transpose()
}

fn read_demographics(conn: &Connection, mrn: &str) -> Result<Option<CoreDemographic>> {
  let Some(found) = identity::find_by_mrn(conn, mrn)? else {
    return Ok(None);
  };
  visit::demographic_of(conn, identity::live_id(conn, found.mrn_id)?)
}

fn read_location_visits(conn: &Connection, encounter: &str) -> Result<Vec<LocationVisit>> {
  match visit::find(conn, encounter)? {
    Some((hv, _)) => location::visits_of(conn, hv.hospital_visit_id),
    None => Ok(Vec::new()),
  }
}

fn read_planned_movements(conn: &Connection, encounter: &str) -> Result<Vec<PlannedMovement>> {
  match visit::find(conn, encounter)? {
    Some((hv, _)) => planned::movements_of(conn, hv.hospital_visit_id),
    None => Ok(Vec::new()),
  }
}
