//! Integration tests for `SqliteStore` against an in-memory database.

mod audit;
mod deletion;
mod location;
mod outcome;
mod planned;

use adt_core::{
  field::FieldValue,
  message::*,
  store::AdtStore,
  visit::{LocationVisit, PendingType},
};
use chrono::{DateTime, Duration, TimeZone as _, Utc};

use crate::{Result, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Business time: minutes after 08:00 on a fixed day.
fn t(minutes: i64) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2022, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Processing time, well after every business time.
fn stored(n: i64) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(n)
}

async fn apply(s: &SqliteStore, message: AdtMessage) -> Result<()> {
  s.process(message, Utc::now()).await
}

// ─── Message builders ────────────────────────────────────────────────────────

fn header(mrn: &str, encounter: Option<&str>, at: DateTime<Utc>) -> AdtHeader {
  AdtHeader {
    source_message_id:        format!("{mrn}-{at}"),
    source_system:            "EPIC".into(),
    mrn:                      Some(mrn.into()),
    nhs_number:               None,
    visit_number:             encounter.map(str::to_owned),
    event_occurred_datetime:  Some(at),
    recorded_datetime:        at,
    full_location_string:     None,
    previous_location_string: None,
    patient_class:            FieldValue::Unknown,
    mode_of_arrival:          FieldValue::Unknown,
    demographics:             PatientDemographics::default(),
  }
}

fn at_location(mut h: AdtHeader, location: &str) -> AdtHeader {
  h.full_location_string = Some(location.into());
  h
}

fn admit(mrn: &str, encounter: &str, location: &str, at: DateTime<Utc>) -> AdtMessage {
  AdtMessage::AdmitPatient(AdmitPatient {
    header:             at_location(header(mrn, Some(encounter), at), location),
    admission_datetime: Some(at),
  })
}

fn transfer(
  mrn: &str,
  encounter: &str,
  location: &str,
  previous: Option<&str>,
  at: DateTime<Utc>,
) -> AdtMessage {
  let mut h = at_location(header(mrn, Some(encounter), at), location);
  h.previous_location_string = previous.map(str::to_owned);
  AdtMessage::TransferPatient(TransferPatient { header: h })
}

fn discharge(mrn: &str, encounter: &str, location: &str, at: DateTime<Utc>) -> AdtMessage {
  AdtMessage::DischargePatient(DischargePatient {
    header:                at_location(header(mrn, Some(encounter), at), location),
    discharge_datetime:    Some(at),
    discharge_disposition: FieldValue::Unknown,
    discharge_location:    FieldValue::Unknown,
  })
}

fn update_info(mrn: &str, encounter: Option<&str>, at: DateTime<Utc>) -> UpdatePatientInfo {
  UpdatePatientInfo { header: header(mrn, encounter, at) }
}

fn merge(surviving: &str, retiring: &str, at: DateTime<Utc>) -> AdtMessage {
  AdtMessage::MergePatient(MergePatient {
    header:              header(surviving, None, at),
    previous_mrn:        Some(retiring.into()),
    previous_nhs_number: None,
  })
}

fn pending(
  mrn: &str,
  encounter: &str,
  kind: PendingType,
  location: Option<&str>,
  at: DateTime<Utc>,
) -> AdtMessage {
  AdtMessage::PendingTransfer(PendingTransfer {
    header:             header(mrn, Some(encounter), at),
    pending_event_type: kind,
    pending_location:   location.map(str::to_owned),
  })
}

fn delete_person(mrn: &str, at: DateTime<Utc>) -> AdtMessage {
  AdtMessage::DeletePersonInformation(DeletePersonInformation { header: header(mrn, None, at) })
}

// ─── Inspection ──────────────────────────────────────────────────────────────

type Stay = (String, Option<DateTime<Utc>>, bool, Option<DateTime<Utc>>, bool);

fn stays(visits: &[LocationVisit]) -> Vec<Stay> {
  visits
    .iter()
    .map(|v| {
      (
        v.location.clone(),
        v.admission_time,
        v.inferred_admission,
        v.discharge_time,
        v.inferred_discharge,
      )
    })
    .collect()
}

async fn history(s: &SqliteStore, encounter: &str) -> Vec<Stay> {
  stays(&s.location_visits(encounter.into()).await.unwrap())
}

fn stay(location: &str, from: Option<i64>, until: Option<i64>) -> Stay {
  (location.into(), from.map(t), false, until.map(t), false)
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
  if items.len() <= 1 {
    return vec![items.to_vec()];
  }
  let mut out = Vec::new();
  for i in 0..items.len() {
    let mut rest = items.to_vec();
    let head = rest.remove(i);
    for mut tail in permutations(&rest) {
      tail.insert(0, head.clone());
      out.push(tail);
    }
  }
  out
}
