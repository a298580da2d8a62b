use super::*;
use adt_core::visit::PlannedMovement;

fn cancel_pending(
  encounter: &str,
  kind: PendingType,
  location: Option<&str>,
  at: DateTime<Utc>,
) -> AdtMessage {
  AdtMessage::CancelPendingTransfer(CancelPendingTransfer {
    header:             header("M1", Some(encounter), at),
    pending_event_type: kind,
    pending_location:   location.map(str::to_owned),
    cancelled_datetime: Some(at),
  })
}

type Plan = (
  PendingType,
  Option<String>,
  Option<DateTime<Utc>>,
  bool,
  Option<DateTime<Utc>>,
  Option<DateTime<Utc>>,
);

fn plans(movements: &[PlannedMovement]) -> Vec<Plan> {
  movements
    .iter()
    .map(|m| {
      (
        m.event_type,
        m.location.clone(),
        m.event_datetime,
        m.cancelled,
        m.cancelled_datetime,
        m.consumed_datetime,
      )
    })
    .collect()
}

async fn planned(s: &SqliteStore, encounter: &str) -> Vec<Plan> {
  plans(&s.planned_movements(encounter.into()).await.unwrap())
}

#[tokio::test]
async fn pending_transfer_is_consumed_by_the_transfer() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  apply(&s, pending("M1", "E1", PendingType::Transfer, Some("L2"), t(30))).await.unwrap();
  apply(&s, transfer("M1", "E1", "L2", Some("L1"), t(60))).await.unwrap();

  assert_eq!(
    planned(&s, "E1").await,
    vec![(PendingType::Transfer, Some("L2".into()), Some(t(30)), false, None, Some(t(60)))]
  );
}

#[tokio::test]
async fn pending_discharge_is_consumed_by_the_discharge() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  apply(&s, pending("M1", "E1", PendingType::Discharge, None, t(100))).await.unwrap();
  apply(&s, discharge("M1", "E1", "L1", t(180))).await.unwrap();

  let movements = planned(&s, "E1").await;
  assert_eq!(movements.len(), 1);
  let (kind, _, _, cancelled, _, consumed) = &movements[0];
  assert_eq!(*kind, PendingType::Discharge);
  assert!(!cancelled);
  assert_eq!(*consumed, Some(t(180)));
}

#[tokio::test]
async fn repeated_pending_is_recorded_once() {
  let s = store().await;
  for _ in 0..2 {
    apply(&s, pending("M1", "E1", PendingType::Transfer, Some("L2"), t(30))).await.unwrap();
  }
  assert_eq!(planned(&s, "E1").await.len(), 1);
}

#[tokio::test]
async fn cancellation_converges_in_either_order() {
  let announce = || pending("M1", "E1", PendingType::Transfer, Some("L2"), t(30));
  let cancel = || cancel_pending("E1", PendingType::Transfer, Some("L2"), t(40));

  let in_order = store().await;
  apply(&in_order, announce()).await.unwrap();
  apply(&in_order, cancel()).await.unwrap();

  let reversed = store().await;
  apply(&reversed, cancel()).await.unwrap();
  apply(&reversed, announce()).await.unwrap();

  let expected = vec![(PendingType::Transfer, Some("L2".into()), Some(t(30)), true, Some(t(40)), None)];
  assert_eq!(planned(&in_order, "E1").await, expected);
  assert_eq!(planned(&reversed, "E1").await, expected);
}

#[tokio::test]
async fn cancelled_pending_is_not_consumed() {
  let s = store().await;
  apply(&s, admit("M1", "E1", "L1", t(0))).await.unwrap();
  apply(&s, pending("M1", "E1", PendingType::Transfer, Some("L2"), t(30))).await.unwrap();
  apply(&s, cancel_pending("E1", PendingType::Transfer, Some("L2"), t(40))).await.unwrap();
  apply(&s, transfer("M1", "E1", "L2", Some("L1"), t(60))).await.unwrap();

  let movements = planned(&s, "E1").await;
  assert_eq!(movements.len(), 1);
  let (_, _, _, cancelled, _, consumed) = &movements[0];
  assert!(*cancelled);
  assert_eq!(*consumed, None);
}
