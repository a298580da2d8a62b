//! Planned-movement store.
//!
//! Pending admissions, transfers and discharges announced ahead of time.
//! A pending movement is consumed by the confirmed movement that fulfils it,
//! or cancelled. The cancellation may be observed before the announcement;
//! it is then kept as a cancelled row with no event time until the
//! announcement arrives and fills it in.

use adt_core::visit::{PendingType, PlannedMovement};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{
    encode_dt, encode_opt_dt, encode_uuid, FieldTimes, RawPlannedMovement, PLANNED_MOVEMENT_COLUMNS,
  },
  row_state::{RowState, Stamp, TemporalRow},
  Result,
};

impl TemporalRow for PlannedMovement {
  const TABLE: &'static str = "planned_movement";
  const ID_COLUMN: &'static str = "planned_movement_id";

  fn row_id(&self) -> Uuid { self.planned_movement_id }

  fn touch(&mut self, stamp: Stamp) {
    self.valid_from = self.valid_from.max(stamp.event_time);
    self.stored_from = stamp.stored_from;
  }

  fn insert(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      &format!(
        "INSERT INTO planned_movement ({PLANNED_MOVEMENT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
      ),
      rusqlite::params![
        encode_uuid(self.planned_movement_id),
        encode_uuid(self.hospital_visit_id),
        self.event_type.as_ref(),
        self.location,
        encode_opt_dt(self.event_datetime),
        self.cancelled,
        encode_opt_dt(self.cancelled_datetime),
        encode_opt_dt(self.consumed_datetime),
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }

  fn update(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      "UPDATE planned_movement SET
         event_datetime = ?2, cancelled = ?3, cancelled_datetime = ?4,
         consumed_datetime = ?5, valid_from = ?6, stored_from = ?7
       WHERE planned_movement_id = ?1",
      rusqlite::params![
        encode_uuid(self.planned_movement_id),
        encode_opt_dt(self.event_datetime),
        self.cancelled,
        encode_opt_dt(self.cancelled_datetime),
        encode_opt_dt(self.consumed_datetime),
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn movements_of(conn: &Connection, hospital_visit_id: Uuid) -> Result<Vec<PlannedMovement>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PLANNED_MOVEMENT_COLUMNS} FROM planned_movement
     WHERE hospital_visit_id = ?1
     ORDER BY COALESCE(event_datetime, cancelled_datetime), event_type"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(hospital_visit_id)], RawPlannedMovement::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPlannedMovement::into_planned_movement).collect()
}

pub fn load_all(
  conn: &Connection,
  hospital_visit_id: Uuid,
  stamp: Stamp,
) -> Result<Vec<RowState<PlannedMovement>>> {
  Ok(
    movements_of(conn, hospital_visit_id)?
      .into_iter()
      .map(|m| RowState::loaded(m, FieldTimes::new(), stamp))
      .collect(),
  )
}

/// First row of the visit's movements of this type and planned location
/// satisfying `condition`, in `order_by` order.
fn find_one(
  conn: &Connection,
  hospital_visit_id: Uuid,
  event_type: PendingType,
  location: Option<&str>,
  condition: &str,
  order_by: &str,
  at: DateTime<Utc>,
) -> Result<Option<PlannedMovement>> {
  conn
    .query_row(
      &format!(
        "SELECT {PLANNED_MOVEMENT_COLUMNS} FROM planned_movement
         WHERE hospital_visit_id = ?1 AND event_type = ?2 AND location IS ?3 AND ({condition})
         ORDER BY {order_by} LIMIT 1"
      ),
      rusqlite::params![
        encode_uuid(hospital_visit_id),
        event_type.as_ref(),
        location,
        encode_dt(at),
      ],
      RawPlannedMovement::from_row,
    )
    .optional()?
    .map(RawPlannedMovement::into_planned_movement)
    .transpose()
}

fn insert(
  conn: &Connection,
  hospital_visit_id: Uuid,
  event_type: PendingType,
  location: Option<&str>,
  event_datetime: Option<DateTime<Utc>>,
  cancelled_datetime: Option<DateTime<Utc>>,
  stamp: Stamp,
) -> Result<()> {
  let movement = PlannedMovement {
    planned_movement_id: Uuid::new_v4(),
    hospital_visit_id,
    event_type,
    location: location.map(str::to_owned),
    event_datetime,
    cancelled: cancelled_datetime.is_some(),
    cancelled_datetime,
    consumed_datetime: None,
    valid_from: stamp.event_time,
    stored_from: stamp.stored_from,
  };
  RowState::insert(conn, movement, FieldTimes::new(), stamp)?;
  Ok(())
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Record an announced movement at `at`.
pub fn record_pending(
  conn: &Connection,
  hospital_visit_id: Uuid,
  event_type: PendingType,
  location: Option<&str>,
  at: DateTime<Utc>,
  stamp: Stamp,
) -> Result<()> {
  if find_one(conn, hospital_visit_id, event_type, location, "event_datetime = ?4", "event_datetime", at)?
    .is_some()
  {
    tracing::debug!(%event_type, "pending movement already recorded");
    return Ok(());
  }

  // A cancellation that was seen first.
  let cancelled_first = find_one(
    conn,
    hospital_visit_id,
    event_type,
    location,
    "event_datetime IS NULL AND cancelled_datetime >= ?4",
    "cancelled_datetime",
    at,
  )?;
  match cancelled_first {
    Some(movement) => {
      let mut row = RowState::loaded(movement, FieldTimes::new(), stamp);
      row.assign(Some(at), |m| &mut m.event_datetime);
      row.save(conn)?;
    }
    None => insert(conn, hospital_visit_id, event_type, location, Some(at), None, stamp)?,
  }
  Ok(())
}

/// Cancel the closest announced movement at or before `cancelled_at`.
pub fn cancel_pending(
  conn: &Connection,
  hospital_visit_id: Uuid,
  event_type: PendingType,
  location: Option<&str>,
  cancelled_at: DateTime<Utc>,
  stamp: Stamp,
) -> Result<()> {
  if find_one(
    conn,
    hospital_visit_id,
    event_type,
    location,
    "cancelled_datetime = ?4",
    "cancelled_datetime",
    cancelled_at,
  )?
  .is_some()
  {
    tracing::debug!(%event_type, "pending movement cancellation already recorded");
    return Ok(());
  }

  let pending = find_one(
    conn,
    hospital_visit_id,
    event_type,
    location,
    "event_datetime <= ?4 AND cancelled = 0 AND consumed_datetime IS NULL",
    "event_datetime DESC",
    cancelled_at,
  )?;
  match pending {
    Some(movement) => {
      let mut row = RowState::loaded(movement, FieldTimes::new(), stamp);
      row.assign(true, |m| &mut m.cancelled);
      row.assign(Some(cancelled_at), |m| &mut m.cancelled_datetime);
      row.save(conn)?;
    }
    None => {
      tracing::debug!(%event_type, "cancellation seen before its pending movement");
      insert(conn, hospital_visit_id, event_type, location, None, Some(cancelled_at), stamp)?;
    }
  }
  Ok(())
}

/// Mark the closest pending movement fulfilled by a confirmed movement at
/// `confirmed_at` as consumed. Returns whether one matched.
pub fn consume_matching(
  conn: &Connection,
  hospital_visit_id: Uuid,
  event_type: PendingType,
  location: Option<&str>,
  confirmed_at: DateTime<Utc>,
  stamp: Stamp,
) -> Result<bool> {
  if find_one(
    conn,
    hospital_visit_id,
    event_type,
    location,
    "consumed_datetime = ?4",
    "event_datetime",
    confirmed_at,
  )?
  .is_some()
  {
    return Ok(false);
  }

  let pending = find_one(
    conn,
    hospital_visit_id,
    event_type,
    location,
    "event_datetime <= ?4 AND cancelled = 0 AND consumed_datetime IS NULL",
    "event_datetime DESC",
    confirmed_at,
  )?;
  let Some(movement) = pending else {
    return Ok(false);
  };
  let mut row = RowState::loaded(movement, FieldTimes::new(), stamp);
  row.assign(Some(confirmed_at), |m| &mut m.consumed_datetime);
  row.save(conn)?;
  tracing::debug!(%event_type, "consumed pending movement");
  Ok(true)
}
