mod common;

use chrono::{TimeZone, Utc};
use common::{event_sender, seed_shipment, seed_status_update, setup_db};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use shiptrack_api::{
    entities::{shipment, status_update, OrderStatus},
    errors::ServiceError,
    services::imports::{ImportService, StatusUpdateRequest},
    services::reconciliation::{NewStatusEvent, ReconciliationService},
    services::shipments::ShipmentService,
};

fn event(status: OrderStatus) -> NewStatusEvent {
    NewStatusEvent {
        status: Some(status),
        details: None,
        location: None,
        timestamp: None,
    }
}

#[tokio::test]
async fn operator_append_assigns_next_ordinal_and_updates_projection() {
    let db = setup_db().await;
    let reconciliation = ReconciliationService::new(db.clone(), event_sender());

    let owner = seed_shipment(&db, "O7", "T7", true).await;
    seed_status_update(&db, owner.id, OrderStatus::PickedUp, 1).await;
    seed_status_update(&db, owner.id, OrderStatus::InTransit, 2).await;

    let outcome = reconciliation
        .append_event(owner.id, event(OrderStatus::Cancelled))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.history.len(), 3);
    // History is newest-first; the fresh event sits at ordinal 3.
    assert_eq!(outcome.history[0].status_update_ord, 3);
    assert_eq!(outcome.history[0].order_status, OrderStatus::Cancelled);
    assert_eq!(outcome.shipment.order_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn append_against_missing_shipment_is_not_found() {
    let db = setup_db().await;
    let reconciliation = ReconciliationService::new(db.clone(), event_sender());

    let err = reconciliation
        .append_event(9_999, event(OrderStatus::Delivered))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn bulk_append_silently_skips_missing_shipments() {
    let db = setup_db().await;
    let service = ImportService::new(db.clone(), event_sender());

    let first = seed_shipment(&db, "O1", "T1", true).await;
    let second = seed_shipment(&db, "O2", "T2", true).await;

    let updates = vec![
        StatusUpdateRequest {
            shipment_id: first.id,
            order_status: Some(OrderStatus::PickedUp),
            details: None,
            location: None,
            timestamp: None,
        },
        StatusUpdateRequest {
            shipment_id: 9_999,
            order_status: Some(OrderStatus::Delivered),
            details: None,
            location: None,
            timestamp: None,
        },
        StatusUpdateRequest {
            shipment_id: second.id,
            order_status: Some(OrderStatus::Cancelled),
            details: None,
            location: None,
            timestamp: None,
        },
    ];

    let report = service.apply_status_updates(updates).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(|o| o.success));

    let refreshed = shipment::Entity::find_by_id(second.id)
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.order_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn duplicate_events_are_skipped_on_reappend() {
    let db = setup_db().await;
    let reconciliation = ReconciliationService::new(db.clone(), event_sender());

    let owner = seed_shipment(&db, "O5", "T5", true).await;
    let stamped = NewStatusEvent {
        status: Some(OrderStatus::PickedUp),
        details: Some("Dock-4".to_string()),
        location: None,
        timestamp: Some(Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()),
    };

    let first = reconciliation
        .append_event(owner.id, stamped.clone())
        .await
        .unwrap();
    assert_eq!(first.inserted, 1);

    let second = reconciliation.append_event(owner.id, stamped).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_duplicates, 1);
    assert_eq!(second.history.len(), 1);
}

#[tokio::test]
async fn statusless_event_inherits_current_status() {
    let db = setup_db().await;
    let reconciliation = ReconciliationService::new(db.clone(), event_sender());

    let owner = seed_shipment(&db, "O6", "T6", true).await;
    let note = NewStatusEvent {
        status: None,
        details: Some("label reprinted".to_string()),
        location: Some("Depot 3".to_string()),
        timestamp: None,
    };

    let outcome = reconciliation.append_event(owner.id, note).await.unwrap();
    assert_eq!(outcome.history[0].order_status, OrderStatus::YetToBePicked);
    assert_eq!(outcome.history[0].location.as_deref(), Some("Depot 3"));
    assert_eq!(outcome.shipment.order_status, OrderStatus::YetToBePicked);
}

#[tokio::test]
async fn append_by_tracking_resolves_variant_spellings() {
    let db = setup_db().await;
    let reconciliation = ReconciliationService::new(db.clone(), event_sender());

    let owner = seed_shipment(&db, "O8", "TRK-001-99", true).await;

    let outcome = reconciliation
        .append_event_by_tracking("00199", event(OrderStatus::Delivered))
        .await
        .unwrap();
    assert_eq!(outcome.shipment.id, owner.id);
    assert_eq!(outcome.shipment.order_status, OrderStatus::Delivered);
}

#[tokio::test]
async fn deleting_a_shipment_removes_all_history_first() {
    let db = setup_db().await;
    let service = ShipmentService::new(db.clone(), event_sender());

    let owner = seed_shipment(&db, "O4", "T4", true).await;
    for ord in 1..=4 {
        seed_status_update(&db, owner.id, OrderStatus::InTransit, ord).await;
    }

    service.delete_shipment(owner.id).await.unwrap();

    assert!(shipment::Entity::find_by_id(owner.id)
        .one(&*db)
        .await
        .unwrap()
        .is_none());
    let orphans = status_update::Entity::find()
        .filter(status_update::Column::ShipmentId.eq(owner.id))
        .count(&*db)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn deleting_tail_update_recomputes_projection() {
    let db = setup_db().await;
    let sender = event_sender();
    let reconciliation = ReconciliationService::new(db.clone(), sender.clone());
    let service = ShipmentService::new(db.clone(), sender);

    let owner = seed_shipment(&db, "O2", "T2", true).await;
    for status in [
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ] {
        reconciliation.append_event(owner.id, event(status)).await.unwrap();
    }

    let tail = status_update::Entity::find()
        .filter(status_update::Column::ShipmentId.eq(owner.id))
        .filter(status_update::Column::StatusUpdateOrd.eq(3))
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    service.delete_status_update(tail.id).await.unwrap();

    let refreshed = shipment::Entity::find_by_id(owner.id)
        .one(&*db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.order_status, OrderStatus::InTransit);
}
