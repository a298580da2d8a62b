use super::*;
use crate::AuditTable;

// ─── Admission and transfer ──────────────────────────────────────────────────

#[tokio::test]
async fn admit_opens_location_visit() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();

  assert_eq!(history(&s, "E1").await, vec![stay("L1", Some(0), None)]);
  let hv = s.hospital_visit("E1".into()).await.unwrap().unwrap();
  assert_eq!(hv.admission_time, Some(t(0)));
  assert_eq!(hv.discharge_time, None);
}

#[tokio::test]
async fn repeated_admit_is_idempotent() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  let once = history(&s, "E1").await;
  let hv_once = s.hospital_visit("E1".into()).await.unwrap();

  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  assert_eq!(history(&s, "E1").await, once);
  assert_eq!(s.hospital_visit("E1".into()).await.unwrap(), hv_once);
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), 0);
  assert_eq!(s.audit_count(AuditTable::HospitalVisit).await.unwrap(), 0);
}

#[tokio::test]
async fn transfer_closes_current_location() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  apply(&s, transfer("M1", "E1", "L2", Some("L1"), t(60))).await.unwrap();

  assert_eq!(
    history(&s, "E1").await,
    vec![stay("L1", Some(0), Some(60)), stay("L2", Some(60), None)]
  );
}

#[tokio::test]
async fn transfer_without_history_infers_previous_stay() {
  let s = store().await;
  apply(&s, transfer("M1", "E1", "L2", Some("L1"), t(60))).await.unwrap();

  assert_eq!(
    history(&s, "E1").await,
    vec![
      ("L1".into(), None, true, Some(t(60)), false),
      stay("L2", Some(60), None),
    ]
  );
}

#[tokio::test]
async fn transfer_to_same_location_is_a_no_op() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  apply(&s, transfer("M1", "E1", "L1", Some("L1"), t(30))).await.unwrap();

  assert_eq!(history(&s, "E1").await, vec![stay("L1", Some(0), None)]);
}

#[tokio::test]
async fn late_admit_fills_inferred_arrival() {
  let s = store().await;
  let mut update = update_info("M1", Some("E1"), t(60));
  update.header.full_location_string = Some("L1".into());
  apply(&s, AdtMessage::UpdatePatientInfo(update)).await.unwrap();
  assert_eq!(
    history(&s, "E1").await,
    vec![("L1".into(), Some(t(60)), true, None, false)]
  );

  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  assert_eq!(history(&s, "E1").await, vec![stay("L1", Some(0), None)]);
}

#[tokio::test]
async fn sub_microsecond_times_are_idempotent() {
  let s = store().await;
  let at = t(0) + Duration::nanoseconds(500);
  apply(&s, admit("M1", "E1", "L1", at)).await.unwrap();
  let once = history(&s, "E1").await;

  apply(&s, admit("M1", "E1", "L1", at)).await.unwrap();
  assert_eq!(history(&s, "E1").await, once);
  assert_eq!(once, vec![stay("L1", Some(0), None)]);
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), 0);
  assert_eq!(s.audit_count(AuditTable::HospitalVisit).await.unwrap(), 0);
  let hv = s.hospital_visit("E1".into()).await.unwrap().unwrap();
  assert_eq!(hv.admission_time, Some(t(0)));
}

// ─── Discharge ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn discharge_closes_stay_and_stamps_visit() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  let AdtMessage::DischargePatient(mut d) = discharge("M1", "E1", "L1", t(180)) else {
    unreachable!()
  };
  d.discharge_disposition = FieldValue::Save("Home".into());
  d.discharge_location = FieldValue::Save("Usual place of residence".into());
  apply(&s, AdtMessage::DischargePatient(d.clone())).await.unwrap();

  assert_eq!(history(&s, "E1").await, vec![stay("L1", Some(0), Some(180))]);
  let hv = s.hospital_visit("E1".into()).await.unwrap().unwrap();
  assert_eq!(hv.discharge_time, Some(t(180)));
  assert_eq!(hv.discharge_disposition.as_deref(), Some("Home"));
  assert_eq!(hv.discharge_destination.as_deref(), Some("Usual place of residence"));

  // A repeated discharge changes nothing.
  let audits = s.audit_count(AuditTable::LocationVisit).await.unwrap();
  apply(&s, AdtMessage::DischargePatient(d)).await.unwrap();
  assert_eq!(history(&s, "E1").await, vec![stay("L1", Some(0), Some(180))]);
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), audits);
}

#[tokio::test]
async fn discharge_without_location_uses_open_stay() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  let AdtMessage::DischargePatient(mut d) = discharge("M1", "E1", "L1", t(90)) else {
    unreachable!()
  };
  d.header.full_location_string = None;
  apply(&s, AdtMessage::DischargePatient(d)).await.unwrap();

  assert_eq!(history(&s, "E1").await, vec![stay("L1", Some(0), Some(90))]);
}

// ─── Order independence ──────────────────────────────────────────────────────

fn journey(with_previous: bool) -> Vec<AdtMessage> {
  let prev = |l: &'static str| with_previous.then_some(l);
  vec![
    admit("M1", "E1", "L1", t(0)),
    transfer("M1", "E1", "L2", prev("L1"), t(60)),
    transfer("M1", "E1", "L3", prev("L2"), t(120)),
    discharge("M1", "E1", "L3", t(180)),
  ]
}

fn expected_journey() -> Vec<Stay> {
  vec![
    stay("L1", Some(0), Some(60)),
    stay("L2", Some(60), Some(120)),
    stay("L3", Some(120), Some(180)),
  ]
}

async fn replay(messages: &[AdtMessage]) -> (Vec<Stay>, Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
  let s = store().await;
  for m in messages {
    apply(&s, m.clone()).await.unwrap();
  }
  let hv = s.hospital_visit("E1".into()).await.unwrap().unwrap();
  (history(&s, "E1").await, hv.admission_time, hv.discharge_time)
}

#[tokio::test]
async fn every_delivery_order_converges() {
  for with_previous in [true, false] {
    for order in permutations(&journey(with_previous)) {
      let (stays, admitted, discharged) = replay(&order).await;
      let kinds: Vec<_> = order.iter().map(AdtMessage::kind).collect();
      assert_eq!(stays, expected_journey(), "order {kinds:?}, previous {with_previous}");
      assert_eq!(admitted, Some(t(0)));
      assert_eq!(discharged, Some(t(180)));
    }
  }
}

#[tokio::test]
async fn every_delivery_order_converges_with_duplicates() {
  for order in permutations(&journey(true)) {
    let doubled: Vec<_> = order.iter().chain(order.iter()).cloned().collect();
    let (stays, _, _) = replay(&doubled).await;
    assert_eq!(stays, expected_journey());
  }
}

#[tokio::test]
async fn revisiting_a_location_converges() {
  for with_previous in [true, false] {
    let prev = |l: &'static str| with_previous.then_some(l);
    let messages = vec![
      admit("M1", "E1", "L1", t(0)),
      transfer("M1", "E1", "L2", prev("L1"), t(60)),
      transfer("M1", "E1", "L1", prev("L2"), t(120)),
      discharge("M1", "E1", "L1", t(180)),
    ];
    for order in permutations(&messages) {
      let (stays, _, _) = replay(&order).await;
      let kinds: Vec<_> = order.iter().map(AdtMessage::kind).collect();
      assert_eq!(
        stays,
        vec![
          stay("L1", Some(0), Some(60)),
          stay("L2", Some(60), Some(120)),
          stay("L1", Some(120), Some(180)),
        ],
        "order {kinds:?}, previous {with_previous}"
      );
    }
  }
}

// ─── Swap ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn swap_exchanges_open_locations() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "BED-1", t(0))).await.unwrap();
  apply(&s, admit("M2", "E2", "BED-2", t(5))).await.unwrap();

  let swap = AdtMessage::SwapLocations(SwapLocations {
    header:             at_location(header("M1", Some("E1"), t(30)), "BED-2"),
    other_mrn:          Some("M2".into()),
    other_nhs_number:   None,
    other_visit_number: "E2".into(),
    other_location:     "BED-1".into(),
  });
  apply(&s, swap).await.unwrap();

  assert_eq!(history(&s, "E1").await, vec![stay("BED-2", Some(0), None)]);
  assert_eq!(history(&s, "E2").await, vec![stay("BED-1", Some(5), None)]);
  assert_eq!(s.audit_count(AuditTable::LocationVisit).await.unwrap(), 2);
}
