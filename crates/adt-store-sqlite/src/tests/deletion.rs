use super::*;
use crate::AuditTable;

async fn admitted_patient(s: &SqliteStore) {
  let AdtMessage::AdmitPatient(mut a) = admit("M1", "E1", "L1", t(0)) else { unreachable!() };
  a.header.demographics.family_name = FieldValue::Save("Smith".into());
  apply(s, AdtMessage::AdmitPatient(a)).await.unwrap();
  apply(s, pending("M1", "E1", PendingType::Transfer, Some("L2"), t(10))).await.unwrap();
}

#[tokio::test]
async fn deletion_removes_everything_but_identifiers() {
  let s = store().await;
  admitted_patient(&s).await;
  apply(&s, delete_person("M1", t(60))).await.unwrap();

  assert!(s.hospital_visit("E1".into()).await.unwrap().is_none());
  assert!(history(&s, "E1").await.is_empty());
  assert!(s.planned_movements("E1".into()).await.unwrap().is_empty());
  assert!(s.demographics("M1".into()).await.unwrap().is_none());
  assert!(s.live_identity("M1".into()).await.unwrap().is_some());

  for table in [
    AuditTable::HospitalVisit,
    AuditTable::LocationVisit,
    AuditTable::PlannedMovement,
    AuditTable::CoreDemographic,
  ] {
    assert_eq!(s.audit_count(table).await.unwrap(), 1, "{table:?}");
  }
  assert_eq!(s.audit_count(AuditTable::Mrn).await.unwrap(), 0);
}

#[tokio::test]
async fn deletion_older_than_stored_state_is_inert() {
  let s = store().await;
  admitted_patient(&s).await;
  apply(&s, delete_person("M1", t(5))).await.unwrap();

  assert!(s.hospital_visit("E1".into()).await.unwrap().is_some());
  assert_eq!(history(&s, "E1").await.len(), 1);
  assert!(s.demographics("M1".into()).await.unwrap().is_some());
  assert_eq!(s.audit_count(AuditTable::HospitalVisit).await.unwrap(), 0);
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), 0);
}

#[tokio::test]
async fn deletion_covers_merged_identifiers() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  apply(&s, admit("M2", "E2", "L2", t(0))).await.unwrap();
  apply(&s, merge("M1", "M2", t(30))).await.unwrap();
  apply(&s, delete_person("M2", t(60))).await.unwrap();

  assert!(s.hospital_visit("E1".into()).await.unwrap().is_none());
  assert!(s.hospital_visit("E2".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn deletion_of_unknown_person_is_a_no_op() {
  let s = store().await;
  apply(&s, delete_person("M404", t(0))).await.unwrap();
  assert!(s.live_identity("M404".into()).await.unwrap().is_none());
}
