mod common;

use common::{seed_shipment, seed_status_update, setup_db};
use shiptrack_api::{
    entities::OrderStatus,
    services::tracking::{resolve_shipment, TrackingService},
};

#[tokio::test]
async fn exact_match_wins_over_looser_strategies() {
    let db = setup_db().await;
    // A superstring candidate exists, but the exact match takes priority.
    seed_shipment(&db, "O1", "TRK-100-XL", true).await;
    let exact = seed_shipment(&db, "O2", "TRK-100", true).await;

    let found = resolve_shipment(&db, "TRK-100").await.unwrap().unwrap();
    assert_eq!(found.id, exact.id);
}

#[tokio::test]
async fn trimmed_input_matches_exactly() {
    let db = setup_db().await;
    let seeded = seed_shipment(&db, "O1", "TRK-7", true).await;

    let found = resolve_shipment(&db, "  TRK-7  ").await.unwrap().unwrap();
    assert_eq!(found.id, seeded.id);
}

#[tokio::test]
async fn substring_containment_tolerates_carrier_affixes() {
    let db = setup_db().await;
    let seeded = seed_shipment(&db, "O1", "XX-ABC-123-YY", true).await;

    let found = resolve_shipment(&db, "ABC-123").await.unwrap().unwrap();
    assert_eq!(found.id, seeded.id);
}

#[tokio::test]
async fn digits_only_fallback_matches_without_false_positives() {
    let db = setup_db().await;
    let target = seed_shipment(&db, "O1", "TRK-001-99", true).await;
    // Shares a digit prefix with the target but does not contain its digit
    // sequence; must never be picked up by the fallback.
    seed_shipment(&db, "O2", "TRK-0019-88", true).await;

    // Lowercase input fails the case-sensitive strategies 1-3 and resolves
    // through digits-only containment ("00199" within "00199").
    let found = resolve_shipment(&db, "trk-001-99").await.unwrap().unwrap();
    assert_eq!(found.id, target.id);

    // A needle matching neither digit sequence resolves nothing.
    assert!(resolve_shipment(&db, "77777").await.unwrap().is_none());
}

#[tokio::test]
async fn unpublished_shipments_are_never_matched() {
    let db = setup_db().await;
    seed_shipment(&db, "O1", "SECRET-1", false).await;

    assert!(resolve_shipment(&db, "SECRET-1").await.unwrap().is_none());
    assert!(resolve_shipment(&db, "1").await.unwrap().is_none());
}

#[tokio::test]
async fn blank_or_digitless_input_resolves_nothing() {
    let db = setup_db().await;
    seed_shipment(&db, "O1", "TRK-1", true).await;

    assert!(resolve_shipment(&db, "   ").await.unwrap().is_none());
    assert!(resolve_shipment(&db, "???").await.unwrap().is_none());
}

#[tokio::test]
async fn ties_break_on_ascending_id() {
    let db = setup_db().await;
    let first = seed_shipment(&db, "O1", "A-555-X", true).await;
    seed_shipment(&db, "O2", "B-555-Y", true).await;

    let found = resolve_shipment(&db, "555").await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
async fn track_returns_full_history_newest_first() {
    let db = setup_db().await;
    let seeded = seed_shipment(&db, "O1", "TRK-42", true).await;
    seed_status_update(&db, seeded.id, OrderStatus::PickedUp, 1).await;
    seed_status_update(&db, seeded.id, OrderStatus::InTransit, 2).await;
    seed_status_update(&db, seeded.id, OrderStatus::Delivered, 3).await;

    let service = TrackingService::new(db.clone());
    let tracked = service.track("TRK-42").await.unwrap().expect("resolved");

    assert_eq!(tracked.shipment.id, seeded.id);
    let ordinals: Vec<i32> = tracked
        .status_updates
        .iter()
        .map(|u| u.status_update_ord)
        .collect();
    assert_eq!(ordinals, vec![3, 2, 1]);
}
