#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

use shiptrack_api::{
    db::DbPool,
    entities::{shipment, status_update, OrderStatus},
    events::{self, EventSender},
    migrator::Migrator,
};

/// In-memory SQLite pool with the full schema applied. A single connection
/// keeps the in-memory database alive and shared across all operations.
pub async fn setup_db() -> Arc<DbPool> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.expect("in-memory sqlite");
    Migrator::up(&db, None).await.expect("migrations");
    Arc::new(db)
}

/// Event sender backed by a drained channel so sends never block.
pub fn event_sender() -> EventSender {
    let (sender, receiver) = events::channel(256);
    tokio::spawn(events::process_events(receiver));
    sender
}

pub async fn seed_shipment(
    db: &DbPool,
    order_id: &str,
    tracking_id: &str,
    published: bool,
) -> shipment::Model {
    shipment::ActiveModel {
        order_id: Set(order_id.to_string()),
        tracking_id: Set(tracking_id.to_string()),
        order_date: Set(Utc::now()),
        order_status: Set(OrderStatus::YetToBePicked),
        is_published: Set(published),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed shipment")
}

pub async fn seed_status_update(
    db: &DbPool,
    shipment_id: i32,
    status: OrderStatus,
    ord: i32,
) -> status_update::Model {
    status_update::ActiveModel {
        shipment_id: Set(shipment_id),
        order_status: Set(status),
        timestamp: Set(Utc
            .with_ymd_and_hms(2024, 1, ord as u32, 12, 0, 0)
            .single()
            .expect("valid seed timestamp")),
        status_update_ord: Set(ord),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed status update")
}
