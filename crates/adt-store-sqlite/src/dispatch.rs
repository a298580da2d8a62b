//! ADT operation dispatcher.
//!
//! Routes one message to the identity resolver, hospital visit manager,
//! location history and planned-movement store. Everything here runs inside
//! the caller's transaction; returning an error rolls all of it back.
//!
//! Rows are always resolved in the same order: identifier, then hospital
//! visit, then location visits and planned movements.

use adt_core::{
  identity::Mrn,
  message::{
    AdmitPatient, AdtHeader, AdtMessage, CancelAdmitPatient, CancelDischargePatient,
    CancelPendingTransfer, CancelTransferPatient, ChangePatientIdentifiers,
    DeletePersonInformation, DischargePatient, MergePatient, MoveVisitInformation, PendingTransfer,
    RegisterPatient, SwapLocations, TransferPatient, UpdatePatientInfo,
  },
  visit::{HospitalVisit, PendingType},
  Error as CoreError,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::{
  identity,
  location::{self, LocationHistory},
  planned,
  row_state::{RowState, Stamp},
  visit, Result,
};

/// Apply `message` with `stored_from` as the system time of every write.
pub fn apply(conn: &Connection, message: &AdtMessage, stored_from: DateTime<Utc>) -> Result<()> {
  let stamp = Stamp {
    event_time: message.event_time(),
    recorded: message.header().recorded_datetime,
    stored_from,
  };
  match message {
    AdtMessage::AdmitPatient(m) => admit(conn, m, stamp),
    AdtMessage::RegisterPatient(m) => register(conn, m, stamp),
    AdtMessage::TransferPatient(m) => transfer(conn, m, stamp),
    AdtMessage::DischargePatient(m) => discharge(conn, m, stamp),
    AdtMessage::UpdatePatientInfo(m) => update_info(conn, m, stamp),
    AdtMessage::CancelAdmitPatient(m) => cancel_admit(conn, m, stamp),
    AdtMessage::CancelTransferPatient(m) => cancel_transfer(conn, m, stamp),
    AdtMessage::CancelDischargePatient(m) => cancel_discharge(conn, m, stamp),
    AdtMessage::MergePatient(m) => merge(conn, m, stamp),
    AdtMessage::ChangePatientIdentifiers(m) => change_identifiers(conn, m, stamp),
    AdtMessage::MoveVisitInformation(m) => move_visit(conn, m, stamp),
    AdtMessage::SwapLocations(m) => swap_locations(conn, m, stamp),
    AdtMessage::PendingTransfer(m) => pending(conn, m, stamp),
    AdtMessage::CancelPendingTransfer(m) => cancel_pending(conn, m, stamp),
    AdtMessage::DeletePersonInformation(m) => delete_person(conn, m, stamp),
  }
}

// ─── Shared steps ────────────────────────────────────────────────────────────

fn encounter(header: &AdtHeader) -> Result<&str> {
  header
    .visit_number
    .as_deref()
    .ok_or_else(|| CoreError::ignored("message has no visit number").into())
}

fn location(header: &AdtHeader) -> Result<&str> {
  header
    .full_location_string
    .as_deref()
    .ok_or_else(|| CoreError::ignored("message has no location").into())
}

/// Resolve the live identity and apply the message's demographics.
fn patient(conn: &Connection, header: &AdtHeader, stamp: Stamp) -> Result<Mrn> {
  let live = identity::get_or_create(
    conn,
    header.mrn.as_deref(),
    header.nhs_number.as_deref(),
    &header.source_system,
    stamp,
  )?;
  visit::update_demographics(conn, &live, &header.demographics, stamp)?;
  Ok(live)
}

/// Resolve the patient, then the hospital visit, applying header fields.
fn patient_visit(conn: &Connection, header: &AdtHeader, stamp: Stamp) -> Result<RowState<HospitalVisit>> {
  let encounter = encounter(header)?;
  let live = patient(conn, header, stamp)?;
  let mut hospital_visit = visit::get_or_create(conn, &live, encounter, &header.source_system, stamp)?;
  visit::update_from_header(&mut hospital_visit, header);
  Ok(hospital_visit)
}

/// Reject a movement cancelled by a message recorded no earlier than it.
fn ensure_not_cancelled(
  conn: &Connection,
  encounter: &str,
  location: Option<&str>,
  at: DateTime<Utc>,
  movement: PendingType,
  stamp: Stamp,
) -> Result<()> {
  if location::is_cancelled(conn, encounter, location, at, movement, stamp.recorded)? {
    return Err(CoreError::ignored(format!("{movement} at {at} has been cancelled")).into());
  }
  Ok(())
}

/// Slot an arrival into the visit's history and consume the pending
/// movement it fulfils.
fn arrive(
  conn: &Connection,
  hospital_visit: &RowState<HospitalVisit>,
  location: &str,
  at: DateTime<Utc>,
  previous: Option<&str>,
  movement: PendingType,
  stamp: Stamp,
) -> Result<()> {
  let hv = hospital_visit.entity();
  let mut history = LocationHistory::load(conn, hv.hospital_visit_id, &hv.encounter, stamp)?;
  history.arrive(conn, location, at, previous)?;
  history.save(conn)?;
  planned::consume_matching(conn, hv.hospital_visit_id, movement, Some(location), at, stamp)?;
  Ok(())
}

// ─── Movements ───────────────────────────────────────────────────────────────

fn admit(conn: &Connection, m: &AdmitPatient, stamp: Stamp) -> Result<()> {
  let location = location(&m.header)?;
  let at = m.admission_datetime.unwrap_or(stamp.event_time);
  ensure_not_cancelled(conn, encounter(&m.header)?, Some(location), at, PendingType::Admit, stamp)?;

  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.assign_field("admission_time", Some(at), |v| &mut v.admission_time);
  hospital_visit.save(conn)?;
  arrive(conn, &hospital_visit, location, at, None, PendingType::Admit, stamp)
}

fn register(conn: &Connection, m: &RegisterPatient, stamp: Stamp) -> Result<()> {
  let location = location(&m.header)?;
  let at = m.presentation_datetime.unwrap_or(stamp.event_time);
  ensure_not_cancelled(conn, encounter(&m.header)?, Some(location), at, PendingType::Admit, stamp)?;

  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.assign_field("presentation_time", Some(at), |v| &mut v.presentation_time);
  hospital_visit.save(conn)?;
  arrive(conn, &hospital_visit, location, at, None, PendingType::Admit, stamp)
}

fn transfer(conn: &Connection, m: &TransferPatient, stamp: Stamp) -> Result<()> {
  let location = location(&m.header)?;
  let at = stamp.event_time;
  ensure_not_cancelled(conn, encounter(&m.header)?, Some(location), at, PendingType::Transfer, stamp)?;

  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.save(conn)?;
  let previous = m.header.previous_location_string.as_deref();
  arrive(conn, &hospital_visit, location, at, previous, PendingType::Transfer, stamp)
}

fn discharge(conn: &Connection, m: &DischargePatient, stamp: Stamp) -> Result<()> {
  let at = m.discharge_datetime.unwrap_or(stamp.event_time);
  ensure_not_cancelled(conn, encounter(&m.header)?, None, at, PendingType::Discharge, stamp)?;
  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  let hv_id = hospital_visit.entity().hospital_visit_id;
  let mut history = LocationHistory::load(conn, hv_id, &hospital_visit.entity().encounter, stamp)?;

  hospital_visit.assign_field_at("discharge_time", Some(at), at, |v| &mut v.discharge_time);
  if let Some(disposition) = m.discharge_disposition.clone().into_update() {
    hospital_visit.assign_field_at("discharge_disposition", disposition, at, |v| {
      &mut v.discharge_disposition
    });
  }
  if let Some(destination) = m.discharge_location.clone().into_update() {
    hospital_visit.assign_field_at("discharge_destination", destination, at, |v| {
      &mut v.discharge_destination
    });
  }
  hospital_visit.save(conn)?;

  history.discharge(conn, m.header.full_location_string.as_deref(), at)?;
  history.save(conn)?;
  planned::consume_matching(conn, hv_id, PendingType::Discharge, None, at, stamp)?;
  Ok(())
}

fn update_info(conn: &Connection, m: &UpdatePatientInfo, stamp: Stamp) -> Result<()> {
  if m.header.visit_number.is_none() {
    patient(conn, &m.header, stamp)?;
    return Ok(());
  }
  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.save(conn)?;

  if let Some(location) = m.header.full_location_string.as_deref() {
    let hv = hospital_visit.entity();
    let mut history = LocationHistory::load(conn, hv.hospital_visit_id, &hv.encounter, stamp)?;
    history.ensure_open_visit(conn, location, stamp.event_time)?;
    history.save(conn)?;
  }
  Ok(())
}

// ─── Cancellations ───────────────────────────────────────────────────────────

/// Undo an admission. The visit itself is deleted only once it has no
/// location visits left; while other stays remain it is kept and only its
/// admission time is cleared.
fn cancel_admit(conn: &Connection, m: &CancelAdmitPatient, stamp: Stamp) -> Result<()> {
  let encounter = encounter(&m.header)?;
  patient(conn, &m.header, stamp)?;
  let message_location = m.header.full_location_string.as_deref();

  let Some(mut hospital_visit) = visit::load(conn, encounter, stamp)? else {
    if let (Some(location), Some(at)) = (message_location, m.cancelled_datetime) {
      tracing::debug!(encounter, "admission cancelled before it was seen");
      location::record_cancellation(conn, encounter, Some(location), at, PendingType::Admit, stamp)?;
    }
    return Ok(());
  };
  visit::update_from_header(&mut hospital_visit, &m.header);
  let hv_id = hospital_visit.entity().hospital_visit_id;

  let mut history = LocationHistory::load(conn, hv_id, encounter, stamp)?;
  let removed = history.cancel_admit(conn, message_location, m.cancelled_datetime)?;
  history.save(conn)?;

  let at = m.cancelled_datetime.or(removed.as_ref().and_then(|r| r.admission_time));
  let location = removed.as_ref().map(|r| r.location.as_str()).or(message_location);
  if let (Some(location), Some(at)) = (location, at) {
    location::record_cancellation(conn, encounter, Some(location), at, PendingType::Admit, stamp)?;
  }

  if removed.is_some() && history.is_empty() {
    for movement in planned::load_all(conn, hv_id, stamp)? {
      movement.delete(conn)?;
    }
    location::forget_encounter(conn, encounter)?;
    hospital_visit.delete(conn)?;
    tracing::info!(encounter, "admission cancelled; visit removed");
    return Ok(());
  }
  if at.is_some() && hospital_visit.entity().admission_time == at {
    hospital_visit.assign_field("admission_time", None, |v| &mut v.admission_time);
  }
  hospital_visit.save(conn)?;
  Ok(())
}

fn cancel_transfer(conn: &Connection, m: &CancelTransferPatient, stamp: Stamp) -> Result<()> {
  let encounter = encounter(&m.header)?;
  let location = m
    .cancelled_location()
    .ok_or_else(|| CoreError::ignored("transfer cancellation names no location"))?;
  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.save(conn)?;

  let hv_id = hospital_visit.entity().hospital_visit_id;
  let mut history = LocationHistory::load(conn, hv_id, encounter, stamp)?;
  let (removed, at) = history.cancel_transfer(
    conn,
    location,
    m.cancelled_datetime,
    m.header.previous_location_string.as_deref(),
  )?;
  history.save(conn)?;

  location::record_cancellation(conn, encounter, Some(location), at, PendingType::Transfer, stamp)?;
  if removed.is_none() {
    tracing::debug!(encounter, location, "transfer cancelled before it was seen");
  }
  Ok(())
}

fn cancel_discharge(conn: &Connection, m: &CancelDischargePatient, stamp: Stamp) -> Result<()> {
  let encounter = encounter(&m.header)?;
  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  let hv_id = hospital_visit.entity().hospital_visit_id;
  let mut history = LocationHistory::load(conn, hv_id, encounter, stamp)?;
  let (discharged_at, forgotten) = history.cancel_discharge(conn, m.cancelled_datetime)?;
  history.save(conn)?;
  location::record_cancellation(conn, encounter, None, discharged_at, PendingType::Discharge, stamp)?;

  if !forgotten {
    tracing::debug!(encounter, %discharged_at, "discharge cancelled before it was seen");
    hospital_visit.save(conn)?;
    return Ok(());
  }
  // Clear as of the cancelled discharge, so a later discharge at the same
  // time applies again.
  hospital_visit.assign_field_at("discharge_time", None, discharged_at, |v| &mut v.discharge_time);
  hospital_visit.assign_field_at("discharge_disposition", None, discharged_at, |v| {
    &mut v.discharge_disposition
  });
  hospital_visit.assign_field_at("discharge_destination", None, discharged_at, |v| {
    &mut v.discharge_destination
  });
  hospital_visit.save(conn)?;
  Ok(())
}

// ─── Identity ────────────────────────────────────────────────────────────────

fn merge(conn: &Connection, m: &MergePatient, stamp: Stamp) -> Result<()> {
  if m.previous_mrn.is_none() && m.previous_nhs_number.is_none() {
    return Err(CoreError::ignored("merge names no retiring identifier").into());
  }
  let surviving = patient(conn, &m.header, stamp)?;
  identity::merge(
    conn,
    m.previous_mrn.as_deref(),
    m.previous_nhs_number.as_deref(),
    &surviving,
    &m.header.source_system,
    stamp,
  )?;
  Ok(())
}

fn change_identifiers(conn: &Connection, m: &ChangePatientIdentifiers, stamp: Stamp) -> Result<()> {
  identity::change_identifier(
    conn,
    m.previous_mrn.as_deref(),
    m.previous_nhs_number.as_deref(),
    m.header.mrn.as_deref(),
    m.header.nhs_number.as_deref(),
    &m.header.source_system,
    stamp,
  )
}

fn move_visit(conn: &Connection, m: &MoveVisitInformation, stamp: Stamp) -> Result<()> {
  let encounter = encounter(&m.header)?;
  let target = identity::get_or_create(
    conn,
    m.header.mrn.as_deref(),
    m.header.nhs_number.as_deref(),
    &m.header.source_system,
    stamp,
  )?;
  let previous = identity::find(conn, m.previous_mrn.as_deref(), m.previous_nhs_number.as_deref())?
    .map(|p| identity::live_of(conn, &p))
    .transpose()?;
  visit::move_visit(conn, encounter, previous.as_ref(), &target, stamp)
}

fn delete_person(conn: &Connection, m: &DeletePersonInformation, stamp: Stamp) -> Result<()> {
  let Some(found) = identity::find(conn, m.header.mrn.as_deref(), m.header.nhs_number.as_deref())?
  else {
    tracing::debug!("person deletion for an unknown identifier");
    return Ok(());
  };
  let live = identity::live_of(conn, &found)?;
  visit::delete_person_information(conn, &live, stamp)?;
  Ok(())
}

// ─── Locations and plans ─────────────────────────────────────────────────────

fn swap_locations(conn: &Connection, m: &SwapLocations, stamp: Stamp) -> Result<()> {
  let location = location(&m.header)?;
  let mut first = patient_visit(conn, &m.header, stamp)?;
  first.save(conn)?;

  let other_live = identity::get_or_create(
    conn,
    m.other_mrn.as_deref(),
    m.other_nhs_number.as_deref(),
    &m.header.source_system,
    stamp,
  )?;
  let second = visit::get_or_create(
    conn,
    &other_live,
    &m.other_visit_number,
    &m.header.source_system,
    stamp,
  )?;

  let (first_hv, second_hv) = (first.entity(), second.entity());
  let mut first_history =
    LocationHistory::load(conn, first_hv.hospital_visit_id, &first_hv.encounter, stamp)?;
  let mut second_history =
    LocationHistory::load(conn, second_hv.hospital_visit_id, &second_hv.encounter, stamp)?;
  first_history.swap_into(conn, location, stamp.event_time)?;
  second_history.swap_into(conn, &m.other_location, stamp.event_time)?;
  first_history.save(conn)?;
  second_history.save(conn)?;
  Ok(())
}

fn pending(conn: &Connection, m: &PendingTransfer, stamp: Stamp) -> Result<()> {
  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.save(conn)?;
  planned::record_pending(
    conn,
    hospital_visit.entity().hospital_visit_id,
    m.pending_event_type,
    m.pending_location.as_deref(),
    stamp.event_time,
    stamp,
  )
}

fn cancel_pending(conn: &Connection, m: &CancelPendingTransfer, stamp: Stamp) -> Result<()> {
  let mut hospital_visit = patient_visit(conn, &m.header, stamp)?;
  hospital_visit.save(conn)?;
  planned::cancel_pending(
    conn,
    hospital_visit.entity().hospital_visit_id,
    m.pending_event_type,
    m.pending_location.as_deref(),
    m.cancelled_datetime.unwrap_or(stamp.event_time),
    stamp,
  )
}
