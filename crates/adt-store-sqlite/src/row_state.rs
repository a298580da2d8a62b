//! Temporal row helper.
//!
//! Every mutation made on behalf of a message goes through a [`RowState`].
//! It decides whether a candidate value supersedes the stored one, and when
//! the row is written back it first copies the pre-message version of the
//! row into the table's `_audit` twin. A row gets at most one audit snapshot
//! per message, however many of its fields change.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::{
  encode::{encode_dt, encode_uuid, FieldTimes},
  Result,
};

// ─── Stamp ───────────────────────────────────────────────────────────────────

/// The clocks of one message: when the event happened, when the source
/// recorded it, and when the engine stored it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
  pub event_time:  DateTime<Utc>,
  pub recorded:    DateTime<Utc>,
  pub stored_from: DateTime<Utc>,
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// Whether `candidate` should replace `current`.
///
/// Equal values and values from a message older than the field's last update
/// are not applied. Staleness is an expected input, not an error.
pub fn should_apply<V: PartialEq>(
  current: &V,
  candidate: &V,
  message_time: DateTime<Utc>,
  field_last_updated: Option<DateTime<Utc>>,
) -> bool {
  if candidate == current {
    return false;
  }
  !matches!(field_last_updated, Some(last) if message_time < last)
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A live table row with an `_audit` twin.
pub trait TemporalRow {
  const TABLE: &'static str;
  const ID_COLUMN: &'static str;

  fn row_id(&self) -> Uuid;

  /// Advance the row's validity and storage times for a write under `stamp`.
  fn touch(&mut self, stamp: Stamp);

  fn insert(&self, conn: &Connection, field_times: &FieldTimes) -> Result<()>;

  fn update(&self, conn: &Connection, field_times: &FieldTimes) -> Result<()>;
}

/// Copy the row as currently stored into its audit table.
pub fn write_audit<T: TemporalRow>(conn: &Connection, row: &T, stamp: Stamp) -> Result<()> {
  let sql = format!(
    "INSERT INTO {table}_audit SELECT *, ?2, ?3 FROM {table} WHERE {id} = ?1",
    table = T::TABLE,
    id = T::ID_COLUMN,
  );
  conn.execute(
    &sql,
    rusqlite::params![
      encode_uuid(row.row_id()),
      encode_dt(stamp.event_time),
      encode_dt(stamp.stored_from),
    ],
  )?;
  Ok(())
}

// ─── RowState ────────────────────────────────────────────────────────────────

/// A row being modified by the current message.
#[derive(Debug)]
pub struct RowState<T: TemporalRow> {
  entity:      T,
  field_times: FieldTimes,
  stamp:       Stamp,
  /// The stored row already reflects this message (inserted by it, or
  /// audited and updated once), so further writes need no snapshot.
  audited:     bool,
  dirty:       bool,
}

impl<T: TemporalRow> RowState<T> {
  /// Insert a brand-new row.
  pub fn insert(
    conn: &Connection,
    mut entity: T,
    field_times: FieldTimes,
    stamp: Stamp,
  ) -> Result<Self> {
    entity.touch(stamp);
    entity.insert(conn, &field_times)?;
    Ok(Self { entity, field_times, stamp, audited: true, dirty: false })
  }

  /// Wrap a row loaded from the database.
  pub fn loaded(entity: T, field_times: FieldTimes, stamp: Stamp) -> Self {
    Self { entity, field_times, stamp, audited: false, dirty: false }
  }

  pub fn entity(&self) -> &T { &self.entity }

  pub fn into_entity(self) -> T { self.entity }

  /// Set a value that is not tracked per field. Applies whenever it differs.
  pub fn assign<V: PartialEq>(&mut self, candidate: V, slot: impl FnOnce(&mut T) -> &mut V) -> bool {
    let current = slot(&mut self.entity);
    if *current == candidate {
      return false;
    }
    *current = candidate;
    self.mark_dirty();
    true
  }

  /// Set a field tracked by its own last-updated time, as of the message's
  /// event time.
  pub fn assign_field<V: PartialEq>(
    &mut self,
    field: &'static str,
    candidate: Option<V>,
    slot: impl FnOnce(&mut T) -> &mut Option<V>,
  ) -> bool {
    let at = self.stamp.event_time;
    self.assign_field_at(field, candidate, at, slot)
  }

  /// As [`RowState::assign_field`], with an explicit business time.
  pub fn assign_field_at<V: PartialEq>(
    &mut self,
    field: &'static str,
    candidate: Option<V>,
    at: DateTime<Utc>,
    slot: impl FnOnce(&mut T) -> &mut Option<V>,
  ) -> bool {
    let last = self.field_times.get(field).copied();
    let current = slot(&mut self.entity);
    if !should_apply(current, &candidate, at, last) {
      return false;
    }
    *current = candidate;
    self.field_times.insert(field.to_owned(), at);
    self.mark_dirty();
    true
  }

  fn mark_dirty(&mut self) {
    if !self.dirty {
      self.entity.touch(self.stamp);
      self.dirty = true;
    }
  }

  /// Write pending changes, snapshotting the pre-message row first.
  /// Returns whether anything was written.
  pub fn save(&mut self, conn: &Connection) -> Result<bool> {
    if !self.dirty {
      return Ok(false);
    }
    if !self.audited {
      write_audit(conn, &self.entity, self.stamp)?;
      self.audited = true;
    }
    self.entity.update(conn, &self.field_times)?;
    self.dirty = false;
    Ok(true)
  }

  /// Remove the row from its live table, keeping its history in audit.
  pub fn delete(self, conn: &Connection) -> Result<T> {
    if !self.audited {
      write_audit(conn, &self.entity, self.stamp)?;
    }
    let sql = format!("DELETE FROM {} WHERE {} = ?1", T::TABLE, T::ID_COLUMN);
    conn.execute(&sql, [encode_uuid(self.entity.row_id())])?;
    Ok(self.entity)
  }
}
