//! Location visit state machine.
//!
//! Every movement reported for an encounter is kept in `location_event`,
//! and the visit's location history is rebuilt from that set after each
//! message by [`plan`]. The rebuilt stays are then reconciled with the
//! stored `location_visit` rows: matching rows are updated in place, the
//! rest inserted or deleted, each change going through [`RowState`].
//!
//! Because the history is a function of the set of movements seen, the
//! order in which messages arrive does not change the outcome. Times the
//! messages never stated are derived from neighbouring movements and
//! flagged as inferred.

use std::{cmp::Ordering, mem};

use adt_core::{
  visit::{LocationVisit, PendingType},
  Error as CoreError,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::{
  encode::{
    encode_dt, encode_opt_dt, encode_uuid, FieldTimes, RawLocationVisit, RawMovement,
    LOCATION_VISIT_COLUMNS, MOVEMENT_COLUMNS,
  },
  row_state::{RowState, Stamp, TemporalRow},
  Result,
};

// ─── Rows ────────────────────────────────────────────────────────────────────

impl TemporalRow for LocationVisit {
  const TABLE: &'static str = "location_visit";
  const ID_COLUMN: &'static str = "location_visit_id";

  fn row_id(&self) -> Uuid { self.location_visit_id }

  fn touch(&mut self, stamp: Stamp) {
    self.valid_from = self.valid_from.max(stamp.event_time);
    self.stored_from = stamp.stored_from;
  }

  fn insert(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      &format!(
        "INSERT INTO location_visit ({LOCATION_VISIT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
      ),
      rusqlite::params![
        encode_uuid(self.location_visit_id),
        encode_uuid(self.hospital_visit_id),
        self.location,
        encode_opt_dt(self.admission_time),
        self.inferred_admission,
        encode_opt_dt(self.discharge_time),
        self.inferred_discharge,
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }

  fn update(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      "UPDATE location_visit SET
         location = ?2, admission_time = ?3, inferred_admission = ?4,
         discharge_time = ?5, inferred_discharge = ?6, valid_from = ?7, stored_from = ?8
       WHERE location_visit_id = ?1",
      rusqlite::params![
        encode_uuid(self.location_visit_id),
        self.location,
        encode_opt_dt(self.admission_time),
        self.inferred_admission,
        encode_opt_dt(self.discharge_time),
        self.inferred_discharge,
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }
}

pub fn visits_of(conn: &Connection, hospital_visit_id: Uuid) -> Result<Vec<LocationVisit>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {LOCATION_VISIT_COLUMNS} FROM location_visit
     WHERE hospital_visit_id = ?1
     ORDER BY COALESCE(admission_time, discharge_time), admission_time, location"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(hospital_visit_id)], RawLocationVisit::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawLocationVisit::into_location_visit).collect()
}

pub fn load_all(
  conn: &Connection,
  hospital_visit_id: Uuid,
  stamp: Stamp,
) -> Result<Vec<RowState<LocationVisit>>> {
  Ok(
    visits_of(conn, hospital_visit_id)?
      .into_iter()
      .map(|v| RowState::loaded(v, FieldTimes::new(), stamp))
      .collect(),
  )
}

// ─── Movements ───────────────────────────────────────────────────────────────

/// What a message reported about where the patient was.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum MovementKind {
  /// Arrived at a location: an admission, registration or transfer.
  Arrival,
  /// Left the hospital, from a named location or from wherever they were.
  Departure,
  /// Still at a location after a cancelled transfer out of it.
  Restored,
  /// Reported at a location by a message that is not a movement.
  Seen,
  /// The stay current at the time was relabelled by a bed swap.
  Swap,
}

/// One reported movement of an encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
  pub kind:     MovementKind,
  /// `None` only for a departure from an unnamed location.
  pub location: Option<String>,
  pub at:       DateTime<Utc>,
  /// Where an arrival says the patient came from.
  pub previous: Option<String>,
}

impl Movement {
  pub fn new(kind: MovementKind, location: &str, at: DateTime<Utc>) -> Self {
    Self { kind, location: Some(location.to_owned()), at, previous: None }
  }

  pub fn arrival(location: &str, at: DateTime<Utc>, previous: Option<&str>) -> Self {
    Self { previous: previous.map(str::to_owned), ..Self::new(MovementKind::Arrival, location, at) }
  }

  pub fn departure(location: Option<&str>, at: DateTime<Utc>) -> Self {
    Self { kind: MovementKind::Departure, location: location.map(str::to_owned), at, previous: None }
  }
}

/// Departures from an unnamed location are stored under the empty string.
fn stored_location(location: Option<&str>) -> &str { location.unwrap_or("") }

pub fn movements_of(conn: &Connection, encounter: &str) -> Result<Vec<Movement>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {MOVEMENT_COLUMNS} FROM location_event WHERE encounter = ?1"
  ))?;
  let raws = stmt
    .query_map([encounter], RawMovement::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMovement::into_movement).collect()
}

/// Record `movement`, keeping the latest recorded time of any message that
/// reported it.
fn record(conn: &Connection, encounter: &str, movement: &Movement, stamp: Stamp) -> Result<()> {
  conn.execute(
    "INSERT INTO location_event
       (encounter, kind, location, event_time, previous, recorded, stored_from)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT (encounter, kind, location, event_time) DO UPDATE SET
       recorded = MAX(recorded, excluded.recorded),
       previous = CASE
         WHEN previous IS NULL THEN excluded.previous
         WHEN excluded.previous IS NULL THEN previous
         ELSE MIN(previous, excluded.previous)
       END",
    rusqlite::params![
      encounter,
      movement.kind.as_ref(),
      stored_location(movement.location.as_deref()),
      encode_dt(movement.at),
      movement.previous,
      encode_dt(stamp.recorded),
      encode_dt(stamp.stored_from),
    ],
  )?;
  Ok(())
}

/// Drop movements of `kind` at `at` that were last reported no later than
/// `stamp.recorded`. `location` of `None` matches any location. Returns how
/// many were dropped.
fn forget(
  conn: &Connection,
  encounter: &str,
  kind: MovementKind,
  location: Option<&str>,
  at: DateTime<Utc>,
  stamp: Stamp,
) -> Result<usize> {
  Ok(conn.execute(
    "DELETE FROM location_event
     WHERE encounter = ?1 AND kind = ?2 AND (?3 IS NULL OR location = ?3)
       AND event_time = ?4 AND recorded <= ?5",
    rusqlite::params![encounter, kind.as_ref(), location, encode_dt(at), encode_dt(stamp.recorded)],
  )?)
}

/// Drop every movement of `encounter`.
pub fn forget_encounter(conn: &Connection, encounter: &str) -> Result<()> {
  conn.execute("DELETE FROM location_event WHERE encounter = ?1", [encounter])?;
  Ok(())
}

// ─── Cancellation tombstones ─────────────────────────────────────────────────

/// Remember that the movement into `location` at `at` was cancelled by a
/// message recorded at `stamp.recorded`. Discharges are remembered without a
/// location.
pub fn record_cancellation(
  conn: &Connection,
  encounter: &str,
  location: Option<&str>,
  at: DateTime<Utc>,
  movement: PendingType,
  stamp: Stamp,
) -> Result<()> {
  conn.execute(
    "INSERT INTO cancelled_movement
       (encounter, location, event_time, movement, cancelled_recorded, stored_from)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT (encounter, location, event_time, movement) DO UPDATE SET
       cancelled_recorded = MAX(cancelled_recorded, excluded.cancelled_recorded)",
    rusqlite::params![
      encounter,
      stored_location(location),
      encode_dt(at),
      movement.as_ref(),
      encode_dt(stamp.recorded),
      encode_dt(stamp.stored_from),
    ],
  )?;
  Ok(())
}

/// Whether a movement recorded at `recorded` was cancelled by a message
/// recorded at or after it.
pub fn is_cancelled(
  conn: &Connection,
  encounter: &str,
  location: Option<&str>,
  at: DateTime<Utc>,
  movement: PendingType,
  recorded: DateTime<Utc>,
) -> Result<bool> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM cancelled_movement
     WHERE encounter = ?1 AND location = ?2 AND event_time = ?3 AND movement = ?4
       AND cancelled_recorded >= ?5",
    rusqlite::params![
      encounter,
      stored_location(location),
      encode_dt(at),
      movement.as_ref(),
      encode_dt(recorded),
    ],
    |r| r.get(0),
  )?;
  Ok(count > 0)
}

// ─── Planning ────────────────────────────────────────────────────────────────

/// A stay as derived from the reported movements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stay {
  pub location:           String,
  pub admission_time:     Option<DateTime<Utc>>,
  pub inferred_admission: bool,
  pub discharge_time:     Option<DateTime<Utc>>,
  pub inferred_discharge: bool,
}

impl Stay {
  fn arrived(location: &str, at: DateTime<Utc>) -> Self {
    Self {
      location:           location.to_owned(),
      admission_time:     Some(at),
      inferred_admission: false,
      discharge_time:     None,
      inferred_discharge: false,
    }
  }

  /// A stay known only from the patient leaving it at `until`.
  fn unseen(location: &str, until: DateTime<Utc>) -> Self {
    Self {
      location:           location.to_owned(),
      admission_time:     None,
      inferred_admission: true,
      discharge_time:     Some(until),
      inferred_discharge: false,
    }
  }

  fn key(&self) -> Option<DateTime<Utc>> { self.admission_time.or(self.discharge_time) }

  fn close(&mut self, at: DateTime<Utc>, inferred: bool) {
    self.discharge_time = Some(at);
    self.inferred_discharge = inferred;
  }

  /// An end that a boundary newly known at `at` may replace.
  fn end_yields_to(&self, at: DateTime<Utc>) -> bool {
    self.discharge_time.is_none_or(|end| self.inferred_discharge || end > at)
  }

  fn start_is_inferred(&self) -> bool { self.admission_time.is_none() || self.inferred_admission }
}

fn order(a: &Stay, b: &Stay) -> Ordering {
  a.key()
    .cmp(&b.key())
    .then(a.admission_time.is_some().cmp(&b.admission_time.is_some()))
}

/// The stay the patient was in at `at`.
fn covering(stays: &[Stay], at: DateTime<Utc>) -> Option<usize> {
  stays.iter().rposition(|s| s.key().is_some_and(|k| k <= at))
}

/// A stay starting at `at` with an inferred arrival, placed before every
/// known stay and lasting until the first of them.
fn infer_leading(stays: &mut Vec<Stay>, location: &str, at: DateTime<Utc>) {
  let (end, inferred) = match stays.first() {
    Some(next) if next.location == location => return,
    Some(next) => (next.key(), next.start_is_inferred()),
    None => (None, false),
  };
  stays.insert(0, Stay {
    location:           location.to_owned(),
    admission_time:     Some(at),
    inferred_admission: true,
    discharge_time:     end,
    inferred_discharge: end.is_some() && inferred,
  });
}

/// Derive the location history of an encounter from its movements.
///
/// Arrivals open stays in time order, each closing the one before it; an
/// arrival at the location the patient is already in continues that stay.
/// The first arrival's previous location becomes a stay with an unknown
/// start. A departure closes the stay it falls in, or, when it names a
/// different location, adds a stay with an unknown start that it closes.
/// `Seen` movements only count when nothing else is known about the visit.
pub fn plan(movements: &[Movement]) -> Vec<Stay> {
  let mut sorted: Vec<&Movement> = movements.iter().collect();
  sorted.sort_by(|a, b| (a.at, &a.location).cmp(&(b.at, &b.location)));
  let located = |kind: MovementKind| {
    sorted
      .iter()
      .copied()
      .filter(|m| m.kind == kind)
      .filter_map(|m| Some((m.location.as_deref()?, m)))
      .collect::<Vec<_>>()
  };

  let mut stays: Vec<Stay> = Vec::new();
  for (location, m) in located(MovementKind::Arrival) {
    match stays.last_mut() {
      Some(last) if last.location == location => continue,
      Some(last) => last.close(m.at, false),
      None => {
        if let Some(previous) = m.previous.as_deref().filter(|p| *p != location) {
          stays.push(Stay::unseen(previous, m.at));
        }
      }
    }
    stays.push(Stay::arrived(location, m.at));
  }

  for (location, m) in located(MovementKind::Restored) {
    if covering(&stays, m.at).is_none() {
      infer_leading(&mut stays, location, m.at);
    }
  }

  if stays.is_empty()
    && let Some((location, m)) = located(MovementKind::Seen).into_iter().next()
  {
    infer_leading(&mut stays, location, m.at);
  }

  for (location, m) in located(MovementKind::Swap) {
    match covering(&stays, m.at) {
      Some(c) => location.clone_into(&mut stays[c].location),
      None => infer_leading(&mut stays, location, m.at),
    }
  }

  for m in sorted.iter().filter(|m| m.kind == MovementKind::Departure) {
    let c = covering(&stays, m.at);
    if let Some(c) = c {
      let stay = &mut stays[c];
      let here = m.location.as_deref().is_none_or(|l| l == stay.location);
      if here && (stay.discharge_time == Some(m.at) || stay.end_yields_to(m.at)) {
        stay.close(m.at, false);
        continue;
      }
    }
    let Some(location) = m.location.as_deref() else {
      continue;
    };
    if let Some(c) = c
      && stays[c].end_yields_to(m.at)
    {
      stays[c].close(m.at, true);
    }
    stays.push(Stay::unseen(location, m.at));
    stays.sort_by(order);
  }

  stays
}

// ─── History ─────────────────────────────────────────────────────────────────

/// The location history of one hospital visit, loaded for one message.
pub struct LocationHistory {
  hospital_visit_id: Uuid,
  encounter:         String,
  rows:              Vec<RowState<LocationVisit>>,
  movements:         Vec<Movement>,
  stamp:             Stamp,
}

impl LocationHistory {
  pub fn load(conn: &Connection, hospital_visit_id: Uuid, encounter: &str, stamp: Stamp) -> Result<Self> {
    Ok(Self {
      hospital_visit_id,
      encounter: encounter.to_owned(),
      rows: load_all(conn, hospital_visit_id, stamp)?,
      movements: movements_of(conn, encounter)?,
      stamp,
    })
  }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Where the patient currently is, if anywhere.
  pub fn open_location(&self) -> Option<&str> {
    self
      .rows
      .iter()
      .find(|r| r.entity().is_open())
      .map(|r| r.entity().location.as_str())
  }

  fn record(&mut self, conn: &Connection, movement: Movement) -> Result<()> {
    record(conn, &self.encounter, &movement, self.stamp)?;
    self.movements = movements_of(conn, &self.encounter)?;
    Ok(())
  }

  fn forget(
    &mut self,
    conn: &Connection,
    kind: MovementKind,
    location: Option<&str>,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let dropped = forget(conn, &self.encounter, kind, location, at, self.stamp)?;
    self.movements = movements_of(conn, &self.encounter)?;
    Ok(dropped > 0)
  }

  /// Record that the patient was at `location` at `inferred_start`. This
  /// only opens a stay when the visit has no other known movements.
  pub fn ensure_open_visit(
    &mut self,
    conn: &Connection,
    location: &str,
    inferred_start: DateTime<Utc>,
  ) -> Result<()> {
    self.record(conn, Movement::new(MovementKind::Seen, location, inferred_start))
  }

  /// Record an arrival at `location` at `at`. `previous` is where the
  /// message says the patient came from.
  pub fn arrive(
    &mut self,
    conn: &Connection,
    location: &str,
    at: DateTime<Utc>,
    previous: Option<&str>,
  ) -> Result<()> {
    if previous == Some(location) {
      tracing::debug!(location, "arrival at the location the patient came from; nothing to do");
      return Ok(());
    }
    self.record(conn, Movement::arrival(location, at, previous))
  }

  /// Record the patient leaving the hospital at `at`, from `location` or,
  /// when `None`, from wherever they were.
  pub fn discharge(&mut self, conn: &Connection, location: Option<&str>, at: DateTime<Utc>) -> Result<()> {
    self.record(conn, Movement::departure(location, at))
  }

  /// Relabel the stay the patient is in at `at` as `location`.
  pub fn swap_into(&mut self, conn: &Connection, location: &str, at: DateTime<Utc>) -> Result<()> {
    self.record(conn, Movement::new(MovementKind::Swap, location, at))
  }

  // ── Cancellations ───────────────────────────────────────────────────────

  /// Forget the admission into the stay starting at `cancelled_at`. Returns
  /// the stay as it stood, or `None` when the admission has not been seen
  /// yet.
  ///
  /// Without a cancellation time the stay is only identifiable when it is
  /// the visit's single stay, and then everything known about the visit up
  /// to the cancellation is forgotten.
  pub fn cancel_admit(
    &mut self,
    conn: &Connection,
    location: Option<&str>,
    cancelled_at: Option<DateTime<Utc>>,
  ) -> Result<Option<LocationVisit>> {
    let Some(at) = cancelled_at else {
      let only = match self.rows.as_slice() {
        [] => return Err(CoreError::ignored("no location visit to cancel the admission of").into()),
        [only] => only.entity().clone(),
        rows => {
          return Err(
            CoreError::missing(format!(
              "admission cancelled without a time and the visit has {} location visits",
              rows.len()
            ))
            .into(),
          );
        }
      };
      conn.execute(
        "DELETE FROM location_event WHERE encounter = ?1 AND recorded <= ?2",
        rusqlite::params![self.encounter, encode_dt(self.stamp.recorded)],
      )?;
      self.movements = movements_of(conn, &self.encounter)?;
      return Ok(Some(only));
    };

    let Some(stay) = self
      .rows
      .iter()
      .map(RowState::entity)
      .find(|v| v.admission_time == Some(at) && location.is_none_or(|l| v.location == l))
      .cloned()
    else {
      return Ok(None);
    };
    self.forget(conn, MovementKind::Arrival, Some(&stay.location), at)?;
    self.forget(conn, MovementKind::Seen, Some(&stay.location), at)?;
    Ok(Some(stay))
  }

  /// Forget a transfer into `location`, recording that the patient stayed
  /// at `restore_to`. Returns the cancelled stay, or `None` when the
  /// transfer has not been seen yet, together with the transfer time.
  pub fn cancel_transfer(
    &mut self,
    conn: &Connection,
    location: &str,
    cancelled_at: Option<DateTime<Utc>>,
    restore_to: Option<&str>,
  ) -> Result<(Option<LocationVisit>, DateTime<Utc>)> {
    let at = match cancelled_at {
      Some(at) => at,
      None => {
        let matching: Vec<&LocationVisit> = self
          .rows
          .iter()
          .map(RowState::entity)
          .filter(|v| v.location == location)
          .collect();
        match matching.as_slice() {
          [] => {
            return Err(CoreError::ignored(format!("no location visit at {location} to cancel")).into());
          }
          [only] => only.admission_time.ok_or_else(|| {
            CoreError::ignored(format!("the arrival at {location} was never observed"))
          })?,
          _ => {
            return Err(
              CoreError::missing(format!(
                "transfer to {location} cancelled without a time and it was visited more than once"
              ))
              .into(),
            );
          }
        }
      }
    };

    let cancelled = self
      .rows
      .iter()
      .map(RowState::entity)
      .find(|v| v.location == location && v.admission_time == Some(at))
      .cloned();
    self.forget(conn, MovementKind::Arrival, Some(location), at)?;
    match restore_to.filter(|r| *r != location) {
      Some(restore_to) => self.record(conn, Movement::new(MovementKind::Restored, restore_to, at))?,
      None if cancelled.is_some() => {
        tracing::debug!(location, "cancelled transfer names no location to restore");
      }
      None => {}
    }
    Ok((cancelled, at))
  }

  /// Forget the discharge at `cancelled_at`, or the latest discharge when no
  /// time is given. Returns the discharge time and whether a discharge was
  /// forgotten.
  ///
  /// Fails when no time is given, no discharge has been seen and a stay is
  /// still open, since that means a discharge was never confirmed.
  pub fn cancel_discharge(
    &mut self,
    conn: &Connection,
    cancelled_at: Option<DateTime<Utc>>,
  ) -> Result<(DateTime<Utc>, bool)> {
    let latest = self
      .movements
      .iter()
      .filter(|m| m.kind == MovementKind::Departure)
      .map(|m| m.at)
      .max();
    let at = match (cancelled_at, latest) {
      (Some(at), _) | (None, Some(at)) => at,
      (None, None) if self.open_location().is_some() => {
        return Err(
          CoreError::incompatible("discharge cancelled but the patient was never discharged").into(),
        );
      }
      (None, None) => return Err(CoreError::ignored("no discharge to cancel").into()),
    };
    let forgotten = self.forget(conn, MovementKind::Departure, None, at)?;
    Ok((at, forgotten))
  }

  // ── Reconciliation ──────────────────────────────────────────────────────

  /// Rebuild the history from the recorded movements and write the
  /// difference to `location_visit`.
  pub fn save(&mut self, conn: &Connection) -> Result<()> {
    let stays = plan(&self.movements);
    let mut rows: Vec<Option<RowState<LocationVisit>>> =
      mem::take(&mut self.rows).into_iter().map(Some).collect();
    let mut matched: Vec<Option<RowState<LocationVisit>>> = stays.iter().map(|_| None).collect();

    let passes: [fn(&LocationVisit, &Stay) -> bool; 4] = [
      |v, s| v.location == s.location && v.admission_time.is_some() && v.admission_time == s.admission_time,
      |v, s| v.location == s.location && v.discharge_time.is_some() && v.discharge_time == s.discharge_time,
      |v, s| v.admission_time.is_some() && v.admission_time == s.admission_time,
      |v, s| v.location == s.location,
    ];
    for pass in passes {
      for (stay, slot) in stays.iter().zip(matched.iter_mut()) {
        if slot.is_some() {
          continue;
        }
        if let Some(row) = rows.iter_mut().find(|r| r.as_ref().is_some_and(|r| pass(r.entity(), stay))) {
          *slot = row.take();
        }
      }
    }

    for row in rows.into_iter().flatten() {
      row.delete(conn)?;
    }
    for (stay, slot) in stays.into_iter().zip(matched) {
      let mut row = match slot {
        Some(row) => row,
        None => {
          let visit = self.new_visit(stay);
          self.rows.push(RowState::insert(conn, visit, FieldTimes::new(), self.stamp)?);
          continue;
        }
      };
      row.assign(stay.location, |v| &mut v.location);
      row.assign(stay.admission_time, |v| &mut v.admission_time);
      row.assign(stay.inferred_admission, |v| &mut v.inferred_admission);
      row.assign(stay.discharge_time, |v| &mut v.discharge_time);
      row.assign(stay.inferred_discharge, |v| &mut v.inferred_discharge);
      row.save(conn)?;
      self.rows.push(row);
    }
    Ok(())
  }

  fn new_visit(&self, stay: Stay) -> LocationVisit {
    LocationVisit {
      location_visit_id:  Uuid::new_v4(),
      hospital_visit_id:  self.hospital_visit_id,
      location:           stay.location,
      admission_time:     stay.admission_time,
      inferred_admission: stay.inferred_admission,
      discharge_time:     stay.discharge_time,
      inferred_discharge: stay.inferred_discharge,
      valid_from:         self.stamp.event_time,
      stored_from:        self.stamp.stored_from,
    }
  }
}
