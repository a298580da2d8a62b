//! Hospital visits, the location sojourns nested in them, and announced
//! movements that have not happened yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Hospital visit ──────────────────────────────────────────────────────────

/// One hospital stay, unique on its encounter number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalVisit {
  pub hospital_visit_id:     Uuid,
  pub encounter:             String,
  /// Identifier that owned the visit when it was created, or that a move
  /// reattributed it to.
  pub mrn_id:                Uuid,
  pub source_system:         String,
  pub patient_class:         Option<String>,
  pub arrival_method:        Option<String>,
  pub presentation_time:     Option<DateTime<Utc>>,
  pub admission_time:        Option<DateTime<Utc>>,
  pub discharge_time:        Option<DateTime<Utc>>,
  pub discharge_disposition: Option<String>,
  pub discharge_destination: Option<String>,
  pub valid_from:            DateTime<Utc>,
  pub stored_from:           DateTime<Utc>,
}

// ─── Location visit ──────────────────────────────────────────────────────────

/// One contiguous stay in one physical location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationVisit {
  pub location_visit_id:  Uuid,
  pub hospital_visit_id:  Uuid,
  pub location:           String,
  /// `None` when the arrival was never observed.
  pub admission_time:     Option<DateTime<Utc>>,
  /// The admission time was derived from another event.
  pub inferred_admission: bool,
  /// `None` while the patient is still in this location.
  pub discharge_time:     Option<DateTime<Utc>>,
  pub inferred_discharge: bool,
  pub valid_from:         DateTime<Utc>,
  pub stored_from:        DateTime<Utc>,
}

impl LocationVisit {
  pub fn is_open(&self) -> bool { self.discharge_time.is_none() }

  /// Position of the stay in its visit's history: the admission time, or
  /// the discharge time when the arrival is unknown.
  pub fn sort_key(&self) -> Option<DateTime<Utc>> {
    self.admission_time.or(self.discharge_time)
  }
}

// ─── Planned movement ────────────────────────────────────────────────────────

/// The kind of an announced movement.
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
pub enum PendingType {
  Admit,
  Transfer,
  Discharge,
}

/// An announced admission, transfer or discharge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMovement {
  pub planned_movement_id: Uuid,
  pub hospital_visit_id:   Uuid,
  pub event_type:          PendingType,
  /// Planned destination; discharges usually have none.
  pub location:            Option<String>,
  /// When the movement was announced. `None` when only its cancellation has
  /// been seen so far.
  pub event_datetime:      Option<DateTime<Utc>>,
  pub cancelled:           bool,
  pub cancelled_datetime:  Option<DateTime<Utc>>,
  /// Set once a confirmed movement has matched this row.
  pub consumed_datetime:   Option<DateTime<Utc>>,
  pub valid_from:          DateTime<Utc>,
  pub stored_from:         DateTime<Utc>,
}
