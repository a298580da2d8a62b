//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! microsecond precision, so string comparison in SQL orders them
//! chronologically. Per-field update times are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use std::collections::BTreeMap;

use adt_core::{
  identity::{CoreDemographic, Mrn},
  outcome::MessageOutcome,
  visit::{HospitalVisit, LocationVisit, PendingType, PlannedMovement},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{
  location::{Movement, MovementKind},
  Error, Result,
};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── PendingType ─────────────────────────────────────────────────────────────

pub fn decode_pending_type(s: &str) -> Result<PendingType> {
  s.parse().map_err(|_| Error::UnknownVariant { kind: "pending type", value: s.to_owned() })
}

// ─── Field times ─────────────────────────────────────────────────────────────

/// Last business time each field was written at, keyed by column name.
pub type FieldTimes = BTreeMap<String, DateTime<Utc>>;

pub fn encode_field_times(times: &FieldTimes) -> Result<String> {
  Ok(serde_json::to_string(times)?)
}

pub fn decode_field_times(s: &str) -> Result<FieldTimes> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const MRN_COLUMNS: &str = "mrn_id, mrn, nhs_number, source_system, stored_from";

/// Raw strings read directly from an `mrn` row.
pub struct RawMrn {
  pub mrn_id:        String,
  pub mrn:           Option<String>,
  pub nhs_number:    Option<String>,
  pub source_system: String,
  pub stored_from:   String,
}

impl RawMrn {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      mrn_id:        r.get(0)?,
      mrn:           r.get(1)?,
      nhs_number:    r.get(2)?,
      source_system: r.get(3)?,
      stored_from:   r.get(4)?,
    })
  }

  pub fn into_mrn(self) -> Result<Mrn> {
    Ok(Mrn {
      mrn_id:        decode_uuid(&self.mrn_id)?,
      mrn:           self.mrn,
      nhs_number:    self.nhs_number,
      source_system: self.source_system,
      stored_from:   decode_dt(&self.stored_from)?,
    })
  }
}

pub const DEMOGRAPHIC_COLUMNS: &str = "core_demographic_id, mrn_id, given_name, \
  middle_name, family_name, sex, date_of_birth, home_postcode, alive, date_of_death, \
  field_times, valid_from, stored_from";

pub struct RawDemographic {
  pub core_demographic_id: String,
  pub mrn_id:              String,
  pub given_name:          Option<String>,
  pub middle_name:         Option<String>,
  pub family_name:         Option<String>,
  pub sex:                 Option<String>,
  pub date_of_birth:       Option<String>,
  pub home_postcode:       Option<String>,
  pub alive:               Option<bool>,
  pub date_of_death:       Option<String>,
  pub field_times:         String,
  pub valid_from:          String,
  pub stored_from:         String,
}

impl RawDemographic {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      core_demographic_id: r.get(0)?,
      mrn_id:              r.get(1)?,
      given_name:          r.get(2)?,
      middle_name:         r.get(3)?,
      family_name:         r.get(4)?,
      sex:                 r.get(5)?,
      date_of_birth:       r.get(6)?,
      home_postcode:       r.get(7)?,
      alive:               r.get(8)?,
      date_of_death:       r.get(9)?,
      field_times:         r.get(10)?,
      valid_from:          r.get(11)?,
      stored_from:         r.get(12)?,
    })
  }

  pub fn into_demographic(self) -> Result<(CoreDemographic, FieldTimes)> {
    let demographic = CoreDemographic {
      core_demographic_id: decode_uuid(&self.core_demographic_id)?,
      mrn_id:              decode_uuid(&self.mrn_id)?,
      given_name:          self.given_name,
      middle_name:         self.middle_name,
      family_name:         self.family_name,
      sex:                 self.sex,
      date_of_birth:       self.date_of_birth.as_deref().map(decode_date).transpose()?,
      home_postcode:       self.home_postcode,
      alive:               self.alive,
      date_of_death:       decode_opt_dt(self.date_of_death.as_deref())?,
      valid_from:          decode_dt(&self.valid_from)?,
      stored_from:         decode_dt(&self.stored_from)?,
    };
    Ok((demographic, decode_field_times(&self.field_times)?))
  }
}

pub const HOSPITAL_VISIT_COLUMNS: &str = "hospital_visit_id, encounter, mrn_id, \
  source_system, patient_class, arrival_method, presentation_time, admission_time, \
  discharge_time, discharge_disposition, discharge_destination, field_times, \
  valid_from, stored_from";

pub struct RawHospitalVisit {
  pub hospital_visit_id:     String,
  pub encounter:             String,
  pub mrn_id:                String,
  pub source_system:         String,
  pub patient_class:         Option<String>,
  pub arrival_method:        Option<String>,
  pub presentation_time:     Option<String>,
  pub admission_time:        Option<String>,
  pub discharge_time:        Option<String>,
  pub discharge_disposition: Option<String>,
  pub discharge_destination: Option<String>,
  pub field_times:           String,
  pub valid_from:            String,
  pub stored_from:           String,
}

impl RawHospitalVisit {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      hospital_visit_id:     r.get(0)?,
      encounter:             r.get(1)?,
      mrn_id:                r.get(2)?,
      source_system:         r.get(3)?,
      patient_class:         r.get(4)?,
      arrival_method:        r.get(5)?,
      presentation_time:     r.get(6)?,
      admission_time:        r.get(7)?,
      discharge_time:        r.get(8)?,
      discharge_disposition: r.get(9)?,
      discharge_destination: r.get(10)?,
      field_times:           r.get(11)?,
      valid_from:            r.get(12)?,
      stored_from:           r.get(13)?,
    })
  }

  pub fn into_hospital_visit(self) -> Result<(HospitalVisit, FieldTimes)> {
    let visit = HospitalVisit {
      hospital_visit_id:     decode_uuid(&self.hospital_visit_id)?,
      encounter:             self.encounter,
      mrn_id:                decode_uuid(&self.mrn_id)?,
      source_system:         self.source_system,
      patient_class:         self.patient_class,
      arrival_method:        self.arrival_method,
      presentation_time:     decode_opt_dt(self.presentation_time.as_deref())?,
      admission_time:        decode_opt_dt(self.admission_time.as_deref())?,
      discharge_time:        decode_opt_dt(self.discharge_time.as_deref())?,
      discharge_disposition: self.discharge_disposition,
      discharge_destination: self.discharge_destination,
      valid_from:            decode_dt(&self.valid_from)?,
      stored_from:           decode_dt(&self.stored_from)?,
    };
    Ok((visit, decode_field_times(&self.field_times)?))
  }
}

pub const LOCATION_VISIT_COLUMNS: &str = "location_visit_id, hospital_visit_id, \
  location, admission_time, inferred_admission, discharge_time, inferred_discharge, \
  valid_from, stored_from";

pub struct RawLocationVisit {
  pub location_visit_id:  String,
  pub hospital_visit_id:  String,
  pub location:           String,
  pub admission_time:     Option<String>,
  pub inferred_admission: bool,
  pub discharge_time:     Option<String>,
  pub inferred_discharge: bool,
  pub valid_from:         String,
  pub stored_from:        String,
}

impl RawLocationVisit {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      location_visit_id:  r.get(0)?,
      hospital_visit_id:  r.get(1)?,
      location:           r.get(2)?,
      admission_time:     r.get(3)?,
      inferred_admission: r.get(4)?,
      discharge_time:     r.get(5)?,
      inferred_discharge: r.get(6)?,
      valid_from:         r.get(7)?,
      stored_from:        r.get(8)?,
    })
  }

  pub fn into_location_visit(self) -> Result<LocationVisit> {
    Ok(LocationVisit {
      location_visit_id:  decode_uuid(&self.location_visit_id)?,
      hospital_visit_id:  decode_uuid(&self.hospital_visit_id)?,
      location:           self.location,
      admission_time:     decode_opt_dt(self.admission_time.as_deref())?,
      inferred_admission: self.inferred_admission,
      discharge_time:     decode_opt_dt(self.discharge_time.as_deref())?,
      inferred_discharge: self.inferred_discharge,
      valid_from:         decode_dt(&self.valid_from)?,
      stored_from:        decode_dt(&self.stored_from)?,
    })
  }
}

pub const PLANNED_MOVEMENT_COLUMNS: &str = "planned_movement_id, hospital_visit_id, \
  event_type, location, event_datetime, cancelled, cancelled_datetime, \
  consumed_datetime, valid_from, stored_from";

pub struct RawPlannedMovement {
  pub planned_movement_id: String,
  pub hospital_visit_id:   String,
  pub event_type:          String,
  pub location:            Option<String>,
  pub event_datetime:      Option<String>,
  pub cancelled:           bool,
  pub cancelled_datetime:  Option<String>,
  pub consumed_datetime:   Option<String>,
  pub valid_from:          String,
  pub stored_from:         String,
}

impl RawPlannedMovement {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      planned_movement_id: r.get(0)?,
      hospital_visit_id:   r.get(1)?,
      event_type:          r.get(2)?,
      location:            r.get(3)?,
      event_datetime:      r.get(4)?,
      cancelled:           r.get(5)?,
      cancelled_datetime:  r.get(6)?,
      consumed_datetime:   r.get(7)?,
      valid_from:          r.get(8)?,
      stored_from:         r.get(9)?,
    })
  }

  pub fn into_planned_movement(self) -> Result<PlannedMovement> {
    Ok(PlannedMovement {
      planned_movement_id: decode_uuid(&self.planned_movement_id)?,
      hospital_visit_id:   decode_uuid(&self.hospital_visit_id)?,
      event_type:          decode_pending_type(&self.event_type)?,
      location:            self.location,
      event_datetime:      decode_opt_dt(self.event_datetime.as_deref())?,
      cancelled:           self.cancelled,
      cancelled_datetime:  decode_opt_dt(self.cancelled_datetime.as_deref())?,
      consumed_datetime:   decode_opt_dt(self.consumed_datetime.as_deref())?,
      valid_from:          decode_dt(&self.valid_from)?,
      stored_from:         decode_dt(&self.stored_from)?,
    })
  }
}

pub const MOVEMENT_COLUMNS: &str = "kind, location, event_time, previous";

/// Raw strings read from a `location_event` row.
pub struct RawMovement {
  pub kind:       String,
  pub location:   String,
  pub event_time: String,
  pub previous:   Option<String>,
}

impl RawMovement {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      kind:       r.get(0)?,
      location:   r.get(1)?,
      event_time: r.get(2)?,
      previous:   r.get(3)?,
    })
  }

  pub fn into_movement(self) -> Result<Movement> {
    Ok(Movement {
      kind:     self.kind.parse::<MovementKind>().map_err(|_| Error::UnknownVariant {
        kind:  "movement kind",
        value: self.kind.clone(),
      })?,
      location: Some(self.location).filter(|l| !l.is_empty()),
      at:       decode_dt(&self.event_time)?,
      previous: self.previous,
    })
  }
}

pub const OUTCOME_COLUMNS: &str = "outcome_id, source_message_id, message_type, \
  message_datetime, status, error_message, processing_started, duration_micros";

pub struct RawOutcome {
  pub outcome_id:         String,
  pub source_message_id:  String,
  pub message_type:       String,
  pub message_datetime:   String,
  pub status:             String,
  pub error_message:      Option<String>,
  pub processing_started: String,
  pub duration_micros:    i64,
}

impl RawOutcome {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      outcome_id:         r.get(0)?,
      source_message_id:  r.get(1)?,
      message_type:       r.get(2)?,
      message_datetime:   r.get(3)?,
      status:             r.get(4)?,
      error_message:      r.get(5)?,
      processing_started: r.get(6)?,
      duration_micros:    r.get(7)?,
    })
  }

  pub fn into_outcome(self) -> Result<MessageOutcome> {
    Ok(MessageOutcome {
      outcome_id:         decode_uuid(&self.outcome_id)?,
      source_message_id:  self.source_message_id,
      message_type:       self.message_type,
      message_datetime:   decode_dt(&self.message_datetime)?,
      status:             self.status.parse().map_err(|_| Error::UnknownVariant {
        kind:  "outcome status",
        value: self.status.clone(),
      })?,
      error_message:      self.error_message,
      processing_started: decode_dt(&self.processing_started)?,
      duration_micros:    self.duration_micros,
    })
  }
}
