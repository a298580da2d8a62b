//! Inbound ADT messages.
//!
//! Every message is one logical admission/discharge/transfer event, already
//! normalised from the upstream wire format. The set of kinds is closed:
//! [`AdtMessage`] is matched exhaustively by the dispatcher.

use chrono::{DateTime, NaiveDate, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};

use crate::{field::FieldValue, visit::PendingType};

// ─── Shared parts ────────────────────────────────────────────────────────────

/// Demographics as reported by a message. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientDemographics {
  pub given_name:    FieldValue<String>,
  pub middle_name:   FieldValue<String>,
  pub family_name:   FieldValue<String>,
  pub sex:           FieldValue<String>,
  pub date_of_birth: FieldValue<NaiveDate>,
  pub home_postcode: FieldValue<String>,
  pub is_alive:      FieldValue<bool>,
  pub date_of_death: FieldValue<DateTime<Utc>>,
}

impl PatientDemographics {
  pub fn is_empty(&self) -> bool { *self == Self::default() }
}

/// Fields common to every message kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdtHeader {
  pub source_message_id:        String,
  pub source_system:            String,
  pub mrn:                      Option<String>,
  pub nhs_number:               Option<String>,
  /// Encounter number. Absent only on identity-level messages.
  pub visit_number:             Option<String>,
  /// When the event happened in the real world.
  pub event_occurred_datetime:  Option<DateTime<Utc>>,
  /// When the source system recorded the event.
  pub recorded_datetime:        DateTime<Utc>,
  pub full_location_string:     Option<String>,
  pub previous_location_string: Option<String>,
  #[serde(default)]
  pub patient_class:            FieldValue<String>,
  #[serde(default)]
  pub mode_of_arrival:          FieldValue<String>,
  #[serde(default)]
  pub demographics:             PatientDemographics,
}

impl AdtHeader {
  /// The authoritative business time of the message.
  pub fn event_time(&self) -> DateTime<Utc> {
    self.event_occurred_datetime.unwrap_or(self.recorded_datetime)
  }
}

// ─── Message payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmitPatient {
  #[serde(flatten)]
  pub header:             AdtHeader,
  pub admission_datetime: Option<DateTime<Utc>>,
}

/// Presentation at an emergency department; arrives the patient at the
/// message location like an admission, without an admission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPatient {
  #[serde(flatten)]
  pub header:                AdtHeader,
  pub presentation_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPatient {
  #[serde(flatten)]
  pub header: AdtHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargePatient {
  #[serde(flatten)]
  pub header:                AdtHeader,
  pub discharge_datetime:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub discharge_disposition: FieldValue<String>,
  #[serde(default)]
  pub discharge_location:    FieldValue<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientInfo {
  #[serde(flatten)]
  pub header: AdtHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAdmitPatient {
  #[serde(flatten)]
  pub header:             AdtHeader,
  /// Admission time of the admit being cancelled, when the source sends it.
  pub cancelled_datetime: Option<DateTime<Utc>>,
}

/// Cancels a transfer into `cancelled_location` (or the header location).
/// The header's previous location names where the patient returns to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTransferPatient {
  #[serde(flatten)]
  pub header:             AdtHeader,
  pub cancelled_location: Option<String>,
  pub cancelled_datetime: Option<DateTime<Utc>>,
}

impl CancelTransferPatient {
  pub fn cancelled_location(&self) -> Option<&str> {
    self
      .cancelled_location
      .as_deref()
      .or(self.header.full_location_string.as_deref())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelDischargePatient {
  #[serde(flatten)]
  pub header:             AdtHeader,
  pub cancelled_datetime: Option<DateTime<Utc>>,
}

/// The header identifiers survive; the previous identifiers are retired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePatient {
  #[serde(flatten)]
  pub header:              AdtHeader,
  pub previous_mrn:        Option<String>,
  pub previous_nhs_number: Option<String>,
}

/// Renames the identifier known as `previous_mrn` to the header MRN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePatientIdentifiers {
  #[serde(flatten)]
  pub header:              AdtHeader,
  pub previous_mrn:        Option<String>,
  pub previous_nhs_number: Option<String>,
}

/// Reattributes the header visit from the previous identifiers to the header
/// identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveVisitInformation {
  #[serde(flatten)]
  pub header:              AdtHeader,
  pub previous_mrn:        Option<String>,
  pub previous_nhs_number: Option<String>,
}

/// Two patients exchange beds: the header visit moves to the header location
/// and the other visit moves to `other_location`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapLocations {
  #[serde(flatten)]
  pub header:             AdtHeader,
  pub other_mrn:          Option<String>,
  pub other_nhs_number:   Option<String>,
  pub other_visit_number: String,
  pub other_location:     String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransfer {
  #[serde(flatten)]
  pub header:             AdtHeader,
  pub pending_event_type: PendingType,
  pub pending_location:   Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPendingTransfer {
  #[serde(flatten)]
  pub header:             AdtHeader,
  pub pending_event_type: PendingType,
  pub pending_location:   Option<String>,
  pub cancelled_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePersonInformation {
  #[serde(flatten)]
  pub header: AdtHeader,
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// One inbound ADT event.
#[derive(Debug, Clone, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdtMessage {
  AdmitPatient(AdmitPatient),
  RegisterPatient(RegisterPatient),
  TransferPatient(TransferPatient),
  DischargePatient(DischargePatient),
  UpdatePatientInfo(UpdatePatientInfo),
  CancelAdmitPatient(CancelAdmitPatient),
  CancelTransferPatient(CancelTransferPatient),
  CancelDischargePatient(CancelDischargePatient),
  MergePatient(MergePatient),
  ChangePatientIdentifiers(ChangePatientIdentifiers),
  MoveVisitInformation(MoveVisitInformation),
  SwapLocations(SwapLocations),
  PendingTransfer(PendingTransfer),
  CancelPendingTransfer(CancelPendingTransfer),
  DeletePersonInformation(DeletePersonInformation),
}

impl AdtMessage {
  pub fn header(&self) -> &AdtHeader {
    match self {
      Self::AdmitPatient(m) => &m.header,
      Self::RegisterPatient(m) => &m.header,
      Self::TransferPatient(m) => &m.header,
      Self::DischargePatient(m) => &m.header,
      Self::UpdatePatientInfo(m) => &m.header,
      Self::CancelAdmitPatient(m) => &m.header,
      Self::CancelTransferPatient(m) => &m.header,
      Self::CancelDischargePatient(m) => &m.header,
      Self::MergePatient(m) => &m.header,
      Self::ChangePatientIdentifiers(m) => &m.header,
      Self::MoveVisitInformation(m) => &m.header,
      Self::SwapLocations(m) => &m.header,
      Self::PendingTransfer(m) => &m.header,
      Self::CancelPendingTransfer(m) => &m.header,
      Self::DeletePersonInformation(m) => &m.header,
    }
  }

  /// Snake-case name of the message kind, as stored in outcome records.
  pub fn kind(&self) -> &'static str { self.into() }

  pub fn event_time(&self) -> DateTime<Utc> { self.header().event_time() }

  pub fn from_json(s: &str) -> crate::Result<Self> { Ok(serde_json::from_str(s)?) }

  fn header_mut(&mut self) -> &mut AdtHeader {
    match self {
      Self::AdmitPatient(m) => &mut m.header,
      Self::RegisterPatient(m) => &mut m.header,
      Self::TransferPatient(m) => &mut m.header,
      Self::DischargePatient(m) => &mut m.header,
      Self::UpdatePatientInfo(m) => &mut m.header,
      Self::CancelAdmitPatient(m) => &mut m.header,
      Self::CancelTransferPatient(m) => &mut m.header,
      Self::CancelDischargePatient(m) => &mut m.header,
      Self::MergePatient(m) => &mut m.header,
      Self::ChangePatientIdentifiers(m) => &mut m.header,
      Self::MoveVisitInformation(m) => &mut m.header,
      Self::SwapLocations(m) => &mut m.header,
      Self::PendingTransfer(m) => &mut m.header,
      Self::CancelPendingTransfer(m) => &mut m.header,
      Self::DeletePersonInformation(m) => &mut m.header,
    }
  }

  /// Drop sub-microsecond precision from every time the message carries.
  /// Stored times have microsecond precision, so anything finer would never
  /// compare equal to what was stored from the same message.
  pub fn truncated_to_micros(mut self) -> Self {
    let header = self.header_mut();
    truncate(&mut header.event_occurred_datetime);
    header.recorded_datetime = header.recorded_datetime.trunc_subsecs(6);
    if let FieldValue::Save(death) = &mut header.demographics.date_of_death {
      *death = death.trunc_subsecs(6);
    }

    match &mut self {
      Self::AdmitPatient(m) => truncate(&mut m.admission_datetime),
      Self::RegisterPatient(m) => truncate(&mut m.presentation_datetime),
      Self::DischargePatient(m) => truncate(&mut m.discharge_datetime),
      Self::CancelAdmitPatient(m) => truncate(&mut m.cancelled_datetime),
      Self::CancelTransferPatient(m) => truncate(&mut m.cancelled_datetime),
      Self::CancelDischargePatient(m) => truncate(&mut m.cancelled_datetime),
      Self::CancelPendingTransfer(m) => truncate(&mut m.cancelled_datetime),
      _ => {}
    }
    self
  }
}

fn truncate(time: &mut Option<DateTime<Utc>>) {
  if let Some(t) = time {
    *t = t.trunc_subsecs(6);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn admit_parses_with_flattened_header() {
    let json = r#"{
      "type": "admit_patient",
      "source_message_id": "m1",
      "source_system": "EPIC",
      "mrn": "40800000",
      "visit_number": "123412341234",
      "event_occurred_datetime": "2020-01-01T10:00:00Z",
      "recorded_datetime": "2020-01-01T10:05:00Z",
      "full_location_string": "ED^UCHED RAT CHAIR^RAT-CHAIR",
      "admission_datetime": "2020-01-01T10:00:00Z",
      "demographics": { "family_name": { "status": "save", "value": "Zachary" } }
    }"#;
    let msg = AdtMessage::from_json(json).unwrap();
    assert_eq!(msg.kind(), "admit_patient");
    let AdtMessage::AdmitPatient(admit) = msg else { panic!("wrong kind") };
    assert_eq!(admit.header.mrn.as_deref(), Some("40800000"));
    assert!(admit.header.demographics.given_name.is_unknown());
    assert_eq!(
      admit.header.demographics.family_name.saved().map(String::as_str),
      Some("Zachary")
    );
    assert!(admit.header.patient_class.is_unknown());
  }

  #[test]
  fn event_time_falls_back_to_recorded() {
    let json = r#"{
      "type": "transfer_patient",
      "source_message_id": "m2",
      "source_system": "EPIC",
      "recorded_datetime": "2020-01-01T11:00:00Z"
    }"#;
    let msg = AdtMessage::from_json(json).unwrap();
    assert_eq!(msg.event_time(), msg.header().recorded_datetime);
  }

  #[test]
  fn times_truncate_to_microseconds() {
    let json = r#"{
      "type": "discharge_patient",
      "source_message_id": "m4",
      "source_system": "EPIC",
      "event_occurred_datetime": "2020-01-01T10:00:00.0000005Z",
      "recorded_datetime": "2020-01-01T10:05:00.1234567Z",
      "discharge_datetime": "2020-01-01T10:00:00.000001999Z"
    }"#;
    let msg = AdtMessage::from_json(json).unwrap().truncated_to_micros();
    let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap();

    assert_eq!(msg.event_time(), at("2020-01-01T10:00:00Z"));
    assert_eq!(msg.header().recorded_datetime, at("2020-01-01T10:05:00.123456Z"));
    let AdtMessage::DischargePatient(d) = msg else { panic!("wrong kind") };
    assert_eq!(d.discharge_datetime, Some(at("2020-01-01T10:00:00.000001Z")));
  }

  #[test]
  fn pending_type_is_snake_case() {
    let json = r#"{
      "type": "pending_transfer",
      "source_message_id": "m3",
      "source_system": "EPIC",
      "recorded_datetime": "2020-01-01T11:00:00Z",
      "pending_event_type": "transfer",
      "pending_location": "T11S^B11S^S11-06"
    }"#;
    let AdtMessage::PendingTransfer(p) = AdtMessage::from_json(json).unwrap() else {
      panic!("wrong kind")
    };
    assert_eq!(p.pending_event_type, PendingType::Transfer);
  }
}
