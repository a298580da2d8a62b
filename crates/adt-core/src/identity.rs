//! Patient identity: identifiers, live pointers and demographics.
//!
//! An identifier is created the first time any message names it and is
//! never physically removed. Merges are expressed by re-pointing
//! [`MrnToLive`] links, so data attached to a retired identifier becomes
//! attributable to the surviving one without being rewritten.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hospital-local patient identifier. Either natural key may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mrn {
  pub mrn_id:        Uuid,
  pub mrn:           Option<String>,
  pub nhs_number:    Option<String>,
  pub source_system: String,
  pub stored_from:   DateTime<Utc>,
}

impl Mrn {
  /// Human-readable label for logs.
  pub fn label(&self) -> String {
    match (&self.mrn, &self.nhs_number) {
      (Some(mrn), _) => format!("MRN {mrn}"),
      (None, Some(nhs)) => format!("NHS {nhs}"),
      (None, None) => format!("identifier {}", self.mrn_id),
    }
  }
}

/// Link from an identifier to the identifier currently believed canonical.
/// Always a single hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrnToLive {
  pub mrn_id:      Uuid,
  pub live_mrn_id: Uuid,
  pub valid_from:  DateTime<Utc>,
  pub stored_from: DateTime<Utc>,
}

/// The current demographic row of a live identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreDemographic {
  pub core_demographic_id: Uuid,
  pub mrn_id:              Uuid,
  pub given_name:          Option<String>,
  pub middle_name:         Option<String>,
  pub family_name:         Option<String>,
  pub sex:                 Option<String>,
  pub date_of_birth:       Option<NaiveDate>,
  pub home_postcode:       Option<String>,
  pub alive:               Option<bool>,
  pub date_of_death:       Option<DateTime<Utc>>,
  pub valid_from:          DateTime<Utc>,
  pub stored_from:         DateTime<Utc>,
}

impl CoreDemographic {
  pub fn empty(mrn_id: Uuid, valid_from: DateTime<Utc>, stored_from: DateTime<Utc>) -> Self {
    Self {
      core_demographic_id: Uuid::new_v4(),
      mrn_id,
      given_name: None,
      middle_name: None,
      family_name: None,
      sex: None,
      date_of_birth: None,
      home_postcode: None,
      alive: None,
      date_of_death: None,
      valid_from,
      stored_from,
    }
  }
}
