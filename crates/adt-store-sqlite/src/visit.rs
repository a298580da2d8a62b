//! Hospital visit manager: encounter-level visits, demographics, visit
//! reattribution and person-information deletion.
//!
//! Visit and demographic fields are tracked individually, so a newer value
//! for one field is never blocked by an older value for another.

use adt_core::{
  identity::{CoreDemographic, Mrn},
  message::{AdtHeader, PatientDemographics},
  visit::HospitalVisit,
  Error as CoreError,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{
    encode_date, encode_dt, encode_field_times, encode_opt_dt, encode_uuid, FieldTimes,
    RawDemographic, RawHospitalVisit, DEMOGRAPHIC_COLUMNS, HOSPITAL_VISIT_COLUMNS,
  },
  identity, location, planned,
  row_state::{RowState, Stamp, TemporalRow},
  Result,
};

// ─── Rows ────────────────────────────────────────────────────────────────────

impl TemporalRow for HospitalVisit {
  const TABLE: &'static str = "hospital_visit";
  const ID_COLUMN: &'static str = "hospital_visit_id";

  fn row_id(&self) -> Uuid { self.hospital_visit_id }

  fn touch(&mut self, stamp: Stamp) {
    self.valid_from = self.valid_from.max(stamp.event_time);
    self.stored_from = stamp.stored_from;
  }

  fn insert(&self, conn: &Connection, field_times: &FieldTimes) -> Result<()> {
    conn.execute(
      &format!(
        "INSERT INTO hospital_visit ({HOSPITAL_VISIT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
      ),
      rusqlite::params![
        encode_uuid(self.hospital_visit_id),
        self.encounter,
        encode_uuid(self.mrn_id),
        self.source_system,
        self.patient_class,
        self.arrival_method,
        encode_opt_dt(self.presentation_time),
        encode_opt_dt(self.admission_time),
        encode_opt_dt(self.discharge_time),
        self.discharge_disposition,
        self.discharge_destination,
        encode_field_times(field_times)?,
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }

  fn update(&self, conn: &Connection, field_times: &FieldTimes) -> Result<()> {
    conn.execute(
      "UPDATE hospital_visit SET
         mrn_id = ?2, source_system = ?3, patient_class = ?4, arrival_method = ?5,
         presentation_time = ?6, admission_time = ?7, discharge_time = ?8,
         discharge_disposition = ?9, discharge_destination = ?10, field_times = ?11,
         valid_from = ?12, stored_from = ?13
       WHERE hospital_visit_id = ?1",
      rusqlite::params![
        encode_uuid(self.hospital_visit_id),
        encode_uuid(self.mrn_id),
        self.source_system,
        self.patient_class,
        self.arrival_method,
        encode_opt_dt(self.presentation_time),
        encode_opt_dt(self.admission_time),
        encode_opt_dt(self.discharge_time),
        self.discharge_disposition,
        self.discharge_destination,
        encode_field_times(field_times)?,
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }
}

impl TemporalRow for CoreDemographic {
  const TABLE: &'static str = "core_demographic";
  const ID_COLUMN: &'static str = "core_demographic_id";

  fn row_id(&self) -> Uuid { self.core_demographic_id }

  fn touch(&mut self, stamp: Stamp) {
    self.valid_from = self.valid_from.max(stamp.event_time);
    self.stored_from = stamp.stored_from;
  }

  fn insert(&self, conn: &Connection, field_times: &FieldTimes) -> Result<()> {
    conn.execute(
      &format!(
        "INSERT INTO core_demographic ({DEMOGRAPHIC_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
      ),
      rusqlite::params![
        encode_uuid(self.core_demographic_id),
        encode_uuid(self.mrn_id),
        self.given_name,
        self.middle_name,
        self.family_name,
        self.sex,
        self.date_of_birth.map(encode_date),
        self.home_postcode,
        self.alive,
        encode_opt_dt(self.date_of_death),
        encode_field_times(field_times)?,
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }

  fn update(&self, conn: &Connection, field_times: &FieldTimes) -> Result<()> {
    conn.execute(
      "UPDATE core_demographic SET
         given_name = ?2, middle_name = ?3, family_name = ?4, sex = ?5,
         date_of_birth = ?6, home_postcode = ?7, alive = ?8, date_of_death = ?9,
         field_times = ?10, valid_from = ?11, stored_from = ?12
       WHERE core_demographic_id = ?1",
      rusqlite::params![
        encode_uuid(self.core_demographic_id),
        self.given_name,
        self.middle_name,
        self.family_name,
        self.sex,
        self.date_of_birth.map(encode_date),
        self.home_postcode,
        self.alive,
        encode_opt_dt(self.date_of_death),
        encode_field_times(field_times)?,
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }
}

// ─── Hospital visits ─────────────────────────────────────────────────────────

pub fn find(conn: &Connection, encounter: &str) -> Result<Option<(HospitalVisit, FieldTimes)>> {
  conn
    .query_row(
      &format!("SELECT {HOSPITAL_VISIT_COLUMNS} FROM hospital_visit WHERE encounter = ?1"),
      [encounter],
      RawHospitalVisit::from_row,
    )
    .optional()?
    .map(RawHospitalVisit::into_hospital_visit)
    .transpose()
}

pub fn load(conn: &Connection, encounter: &str, stamp: Stamp) -> Result<Option<RowState<HospitalVisit>>> {
  Ok(find(conn, encounter)?.map(|(visit, times)| RowState::loaded(visit, times, stamp)))
}

/// Visits owned by any identifier that live-points at `live_mrn_id`.
fn visits_of_identity(conn: &Connection, live_mrn_id: Uuid) -> Result<Vec<(HospitalVisit, FieldTimes)>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {HOSPITAL_VISIT_COLUMNS} FROM hospital_visit
     WHERE mrn_id IN (SELECT mrn_id FROM mrn_to_live WHERE live_mrn_id = ?1)
     ORDER BY encounter"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(live_mrn_id)], RawHospitalVisit::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawHospitalVisit::into_hospital_visit).collect()
}

/// Find the visit for `encounter`, creating it under `live` if unseen.
///
/// An existing visit keeps its owner even when the message implies another
/// identity; only merges and explicit moves reattribute visits.
pub fn get_or_create(
  conn: &Connection,
  live: &Mrn,
  encounter: &str,
  source_system: &str,
  stamp: Stamp,
) -> Result<RowState<HospitalVisit>> {
  if let Some(existing) = load(conn, encounter, stamp)? {
    let owner = identity::live_id(conn, existing.entity().mrn_id)?;
    if owner != live.mrn_id {
      tracing::warn!(
        encounter,
        message_identity = %live.label(),
        "visit is attributed to a different identity than the message implies; keeping stored owner"
      );
    }
    return Ok(existing);
  }

  let visit = HospitalVisit {
    hospital_visit_id:     Uuid::new_v4(),
    encounter:             encounter.to_owned(),
    mrn_id:                live.mrn_id,
    source_system:         source_system.to_owned(),
    patient_class:         None,
    arrival_method:        None,
    presentation_time:     None,
    admission_time:        None,
    discharge_time:        None,
    discharge_disposition: None,
    discharge_destination: None,
    valid_from:            stamp.event_time,
    stored_from:           stamp.stored_from,
  };
  tracing::debug!(encounter, "created hospital visit");
  RowState::insert(conn, visit, FieldTimes::new(), stamp)
}

/// Apply the visit-level fields every message header may carry.
pub fn update_from_header(visit: &mut RowState<HospitalVisit>, header: &AdtHeader) {
  if let Some(class) = header.patient_class.clone().into_update() {
    visit.assign_field("patient_class", class, |v| &mut v.patient_class);
  }
  if let Some(method) = header.mode_of_arrival.clone().into_update() {
    visit.assign_field("arrival_method", method, |v| &mut v.arrival_method);
  }
}

/// Reattribute a visit from the previous identity to `target`.
pub fn move_visit(
  conn: &Connection,
  encounter: &str,
  previous: Option<&Mrn>,
  target: &Mrn,
  stamp: Stamp,
) -> Result<()> {
  let Some(mut visit) = load(conn, encounter, stamp)? else {
    return Err(CoreError::ignored(format!("no hospital visit {encounter} to move")).into());
  };
  let owner = identity::live_id(conn, visit.entity().mrn_id)?;
  if owner == target.mrn_id {
    tracing::debug!(encounter, "visit already belongs to target identity");
    return Ok(());
  }
  let previous_live = previous.map(|p| identity::live_id(conn, p.mrn_id)).transpose()?;
  if previous_live != Some(owner) {
    return Err(
      CoreError::incompatible(format!(
        "visit {encounter} belongs to neither the previous nor the target identity"
      ))
      .into(),
    );
  }
  visit.assign(target.mrn_id, |v| &mut v.mrn_id);
  visit.save(conn)?;
  tracing::info!(encounter, target = %target.label(), "moved visit to another identity");
  Ok(())
}

// ─── Demographics ────────────────────────────────────────────────────────────

fn find_demographic(conn: &Connection, mrn_id: Uuid) -> Result<Option<(CoreDemographic, FieldTimes)>> {
  conn
    .query_row(
      &format!("SELECT {DEMOGRAPHIC_COLUMNS} FROM core_demographic WHERE mrn_id = ?1"),
      [encode_uuid(mrn_id)],
      RawDemographic::from_row,
    )
    .optional()?
    .map(RawDemographic::into_demographic)
    .transpose()
}

pub fn demographic_of(conn: &Connection, mrn_id: Uuid) -> Result<Option<CoreDemographic>> {
  Ok(find_demographic(conn, mrn_id)?.map(|(d, _)| d))
}

/// Route every known field through the temporal row helper. Unknown fields
/// never touch stored values.
pub fn update_demographics(
  conn: &Connection,
  live: &Mrn,
  fields: &PatientDemographics,
  stamp: Stamp,
) -> Result<()> {
  if fields.is_empty() {
    return Ok(());
  }
  let mut row = match find_demographic(conn, live.mrn_id)? {
    Some((row, times)) => RowState::loaded(row, times, stamp),
    None => RowState::insert(
      conn,
      CoreDemographic::empty(live.mrn_id, stamp.event_time, stamp.stored_from),
      FieldTimes::new(),
      stamp,
    )?,
  };

  let f = fields.clone();
  if let Some(v) = f.given_name.into_update() {
    row.assign_field("given_name", v, |d| &mut d.given_name);
  }
  if let Some(v) = f.middle_name.into_update() {
    row.assign_field("middle_name", v, |d| &mut d.middle_name);
  }
  if let Some(v) = f.family_name.into_update() {
    row.assign_field("family_name", v, |d| &mut d.family_name);
  }
  if let Some(v) = f.sex.into_update() {
    row.assign_field("sex", v, |d| &mut d.sex);
  }
  if let Some(v) = f.date_of_birth.into_update() {
    row.assign_field("date_of_birth", v, |d| &mut d.date_of_birth);
  }
  if let Some(v) = f.home_postcode.into_update() {
    row.assign_field("home_postcode", v, |d| &mut d.home_postcode);
  }
  if let Some(v) = f.is_alive.into_update() {
    row.assign_field("alive", v, |d| &mut d.alive);
  }
  if let Some(v) = f.date_of_death.into_update() {
    row.assign_field("date_of_death", v, |d| &mut d.date_of_death);
  }
  row.save(conn)?;
  Ok(())
}

// ─── Person deletion ─────────────────────────────────────────────────────────

/// Delete everything the engine holds about `live` except its identifiers.
///
/// Inert when `event_time` is not newer than the most recent update to any
/// affected row: nothing is deleted and no audit row is written. Returns
/// whether the deletion happened.
pub fn delete_person_information(conn: &Connection, live: &Mrn, stamp: Stamp) -> Result<bool> {
  let mut visits = Vec::new();
  for (visit, times) in visits_of_identity(conn, live.mrn_id)? {
    let locations = location::load_all(conn, visit.hospital_visit_id, stamp)?;
    let movements = planned::load_all(conn, visit.hospital_visit_id, stamp)?;
    visits.push((RowState::loaded(visit, times, stamp), locations, movements));
  }

  let mut demographics = Vec::new();
  let mut stmt = conn.prepare(&format!(
    "SELECT {DEMOGRAPHIC_COLUMNS} FROM core_demographic
     WHERE mrn_id IN (SELECT mrn_id FROM mrn_to_live WHERE live_mrn_id = ?1)"
  ))?;
  let raws = stmt
    .query_map([encode_uuid(live.mrn_id)], RawDemographic::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for raw in raws {
    let (row, times) = raw.into_demographic()?;
    demographics.push(RowState::loaded(row, times, stamp));
  }

  let mut latest: Option<DateTime<Utc>> = None;
  let mut consider = |t: DateTime<Utc>| latest = Some(latest.map_or(t, |l| l.max(t)));
  for (visit, locations, movements) in &visits {
    consider(visit.entity().valid_from);
    locations.iter().for_each(|l| consider(l.entity().valid_from));
    movements.iter().for_each(|m| consider(m.entity().valid_from));
  }
  demographics.iter().for_each(|d| consider(d.entity().valid_from));

  if let Some(latest) = latest
    && stamp.event_time <= latest
  {
    tracing::debug!(
      identity = %live.label(),
      %latest,
      "person deletion predates stored state; ignoring"
    );
    return Ok(false);
  }

  for (visit, locations, movements) in visits {
    for movement in movements {
      movement.delete(conn)?;
    }
    for location in locations {
      location.delete(conn)?;
    }
    location::forget_encounter(conn, &visit.entity().encounter)?;
    visit.delete(conn)?;
  }
  for demographic in demographics {
    demographic.delete(conn)?;
  }
  tracing::info!(identity = %live.label(), "deleted person information");
  Ok(true)
}
