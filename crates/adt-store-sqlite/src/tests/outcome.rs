use super::*;
use adt_core::outcome::OutcomeStatus;

#[tokio::test]
async fn every_message_gets_an_outcome() {
  let s = store().await;

  let ok = s.process_message(admit("M1", "E1", "L1", t(0))).await.unwrap();
  assert_eq!(ok.status, OutcomeStatus::Processed);
  assert_eq!(ok.message_type, "admit_patient");
  assert_eq!(ok.message_datetime, t(0));
  assert!(ok.error_message.is_none());

  let mut h = header("M1", Some("E1"), t(10));
  h.full_location_string = None;
  let no_location = AdtMessage::TransferPatient(TransferPatient { header: h });
  let ignored = s.process_message(no_location).await.unwrap();
  assert_eq!(ignored.status, OutcomeStatus::Ignored);
  assert!(ignored.error_message.is_some());

  apply(&s, transfer("M1", "E1", "L2", Some("L1"), t(60))).await.unwrap();
  let ambiguous = AdtMessage::CancelAdmitPatient(CancelAdmitPatient {
    header:             header("M1", Some("E1"), t(90)),
    cancelled_datetime: None,
  });
  let missing = s.process_message(ambiguous).await.unwrap();
  assert_eq!(missing.status, OutcomeStatus::RequiredDataMissing);

  let recorded: Vec<_> = s
    .outcomes()
    .await
    .unwrap()
    .into_iter()
    .map(|o| (o.outcome_id, o.source_message_id, o.status))
    .collect();
  let expected: Vec<_> = [ok, ignored, missing]
    .into_iter()
    .map(|o| (o.outcome_id, o.source_message_id, o.status))
    .collect();
  assert_eq!(recorded, expected);
}

#[test]
fn only_unexpected_statuses_are_errors() {
  assert!(!OutcomeStatus::Processed.is_error());
  assert!(!OutcomeStatus::Ignored.is_error());
  assert!(OutcomeStatus::RequiredDataMissing.is_error());
  assert!(OutcomeStatus::IncompatibleDatabaseState.is_error());
  assert!(OutcomeStatus::Failed.is_error());
}

#[test]
fn store_errors_map_to_outcome_statuses() {
  use crate::Error;

  let core = Error::from(adt_core::Error::incompatible("x"));
  assert_eq!(core.status(), OutcomeStatus::IncompatibleDatabaseState);
  let sqlite = Error::from(rusqlite::Error::QueryReturnedNoRows);
  assert_eq!(sqlite.status(), OutcomeStatus::Failed);
  assert_eq!(SqliteStore::status_of(&sqlite), OutcomeStatus::Failed);
}
