use crate::{
    db::DbPool,
    entities::{shipment, status_update, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionError,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Input for creating a shipment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShipmentInput {
    #[validate(length(min = 1, message = "Order id is required"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "Tracking id is required"))]
    pub tracking_id: String,
    pub customer_id: Option<i32>,
    pub origin_address: Option<String>,
    pub delivery_address: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub order_status: Option<OrderStatus>,
    pub is_published: Option<bool>,
}

/// Partial update of a shipment's mutable attributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateShipmentInput {
    pub tracking_id: Option<String>,
    pub customer_id: Option<i32>,
    pub origin_address: Option<String>,
    pub delivery_address: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub is_published: Option<bool>,
}

/// Service for managing shipments
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl ShipmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new shipment
    #[instrument(skip(self, input))]
    pub async fn create_shipment(
        &self,
        input: CreateShipmentInput,
    ) -> Result<shipment::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db_pool;
        let duplicate = shipment::Entity::find()
            .filter(shipment::Column::OrderId.eq(input.order_id.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Shipment with order id {} already exists",
                input.order_id
            )));
        }

        let now = Utc::now();
        let created = shipment::ActiveModel {
            order_id: Set(input.order_id),
            tracking_id: Set(input.tracking_id),
            customer_id: Set(input.customer_id),
            origin_address: Set(input.origin_address),
            delivery_address: Set(input.delivery_address),
            order_date: Set(input.order_date.unwrap_or(now)),
            estimated_delivery: Set(input.estimated_delivery),
            order_status: Set(input.order_status.unwrap_or(OrderStatus::YetToBePicked)),
            is_published: Set(input.is_published.unwrap_or(true)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(shipment_id = created.id, order_id = %created.order_id, "shipment created");
        if let Err(e) = self.event_sender.send(Event::ShipmentCreated(created.id)).await {
            warn!(error = %e, "failed to emit shipment created event");
        }
        Ok(created)
    }

    /// Gets a shipment by ID
    #[instrument(skip(self))]
    pub async fn get_shipment(&self, id: i32) -> Result<Option<shipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        shipment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Gets a shipment with its full history, newest ordinal first
    #[instrument(skip(self))]
    pub async fn get_shipment_with_history(
        &self,
        id: i32,
    ) -> Result<Option<(shipment::Model, Vec<status_update::Model>)>, ServiceError> {
        let db = &*self.db_pool;
        let Some(found) = shipment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(None);
        };

        let history = status_update::Entity::find()
            .filter(status_update::Column::ShipmentId.eq(id))
            .order_by_desc(status_update::Column::StatusUpdateOrd)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Some((found, history)))
    }

    /// Finds a shipment by its external order reference
    #[instrument(skip(self))]
    pub async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<shipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        shipment::Entity::find()
            .filter(shipment::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Updates a shipment's mutable attributes
    #[instrument(skip(self, input))]
    pub async fn update_shipment(
        &self,
        id: i32,
        input: UpdateShipmentInput,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        let found = shipment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {id} not found")))?;

        let mut active: shipment::ActiveModel = found.into();
        if let Some(tracking_id) = input.tracking_id {
            active.tracking_id = Set(tracking_id);
        }
        if let Some(customer_id) = input.customer_id {
            active.customer_id = Set(Some(customer_id));
        }
        if let Some(origin_address) = input.origin_address {
            active.origin_address = Set(Some(origin_address));
        }
        if let Some(delivery_address) = input.delivery_address {
            active.delivery_address = Set(Some(delivery_address));
        }
        if let Some(estimated_delivery) = input.estimated_delivery {
            active.estimated_delivery = Set(Some(estimated_delivery));
        }
        if let Some(is_published) = input.is_published {
            active.is_published = Set(is_published);
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::db_error)
    }

    /// Deletes a shipment and its whole status history. The history rows go
    /// first, inside the same transaction, so no orphans survive a partial
    /// failure.
    #[instrument(skip(self))]
    pub async fn delete_shipment(&self, id: i32) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(|txn| {
                Box::pin(async move {
                    let found = shipment::Entity::find_by_id(id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Shipment {id} not found"))
                        })?;

                    status_update::Entity::delete_many()
                        .filter(status_update::Column::ShipmentId.eq(found.id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    shipment::Entity::delete_by_id(found.id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(shipment_id = id, "shipment deleted");
        if let Err(e) = self.event_sender.send(Event::ShipmentDeleted(id)).await {
            warn!(error = %e, "failed to emit shipment deleted event");
        }
        Ok(())
    }

    /// Marks every shipment as published
    #[instrument(skip(self))]
    pub async fn publish_all(&self) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let result = shipment::Entity::update_many()
            .col_expr(shipment::Column::IsPublished, sea_orm::sea_query::Expr::value(true))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }

    /// Deletes one status update and recomputes the owning shipment's
    /// denormalized status from the remaining history tail. History is
    /// append-only; this is the correction path for a bad entry.
    #[instrument(skip(self))]
    pub async fn delete_status_update(&self, update_id: i32) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(|txn| {
                Box::pin(async move {
                    let found = status_update::Entity::find_by_id(update_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Status update {update_id} not found"))
                        })?;

                    let shipment_id = found.shipment_id;
                    status_update::Entity::delete_by_id(found.id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let tail = status_update::Entity::find()
                        .filter(status_update::Column::ShipmentId.eq(shipment_id))
                        .order_by_desc(status_update::Column::StatusUpdateOrd)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let owner = shipment::Entity::find_by_id(shipment_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Shipment {shipment_id} not found"))
                        })?;

                    let mut active: shipment::ActiveModel = owner.into();
                    active.order_status = Set(tail
                        .map(|row| row.order_status)
                        .unwrap_or(OrderStatus::YetToBePicked));
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::db_error)?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })
    }
}
