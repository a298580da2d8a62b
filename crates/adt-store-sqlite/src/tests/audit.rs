use super::*;
use crate::{encode::encode_dt, AuditTable};

#[tokio::test]
async fn audit_rows_carry_superseding_system_time() {
  let s = store().await;
  s.process(admit("M1", "E1", "L1", t(0)), stored(1)).await.unwrap();
  s.process(transfer("M1", "E1", "L2", Some("L1"), t(60)), stored(2)).await.unwrap();
  s.process(transfer("M1", "E1", "L3", Some("L2"), t(120)), stored(3)).await.unwrap();

  assert_eq!(
    s.audit_stored_until(AuditTable::LocationVisit).await.unwrap(),
    vec![encode_dt(stored(2)), encode_dt(stored(3))]
  );
}

#[tokio::test]
async fn one_audit_row_per_row_per_message() {
  let s = store().await;
  s.process(admit("M1", "E1", "L1", t(0)), stored(1)).await.unwrap();

  let AdtMessage::DischargePatient(mut d) = discharge("M1", "E1", "L1", t(180)) else {
    unreachable!()
  };
  d.header.patient_class = FieldValue::Save("INPATIENT".into());
  d.discharge_disposition = FieldValue::Save("Home".into());
  s.process(AdtMessage::DischargePatient(d), stored(2)).await.unwrap();

  assert_eq!(s.audit_count(AuditTable::HospitalVisit).await.unwrap(), 1);
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), 1);
  assert_eq!(
    s.audit_stored_until(AuditTable::HospitalVisit).await.unwrap(),
    vec![encode_dt(stored(2))]
  );
}

#[tokio::test]
async fn rows_written_by_one_message_are_not_audited() {
  let s = store().await;
  s.process(transfer("M1", "E1", "L2", Some("L1"), t(60)), stored(1)).await.unwrap();

  for table in [
    AuditTable::Mrn,
    AuditTable::MrnToLive,
    AuditTable::HospitalVisit,
    AuditTable::LocationVisit,
  ] {
    assert_eq!(s.audit_count(table).await.unwrap(), 0, "{table:?}");
  }
}

#[tokio::test]
async fn rejected_message_leaves_no_trace() {
  let s = store().await;
  s.process(admit("M1", "E1", "L1", t(0)), stored(1)).await.unwrap();
  s.process(transfer("M1", "E1", "L2", Some("L1"), t(60)), stored(2)).await.unwrap();
  let audits = s.audit_count(AuditTable::LocationVisit).await.unwrap();

  let ambiguous = AdtMessage::CancelAdmitPatient(CancelAdmitPatient {
    header:             header("M1", Some("E1"), t(90)),
    cancelled_datetime: None,
  });
  assert!(s.process(ambiguous, stored(3)).await.is_err());
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), audits);
  assert!(s.live_identity("M1".into()).await.unwrap().is_some());
}
