//! Status-history reconciliation.
//!
//! Merges freshly parsed status events against a shipment's persisted
//! history and keeps the shipment's denormalized `order_status` equal to the
//! status of the highest-ordinal row. All reads and writes for one merge run
//! inside a single transaction, so ordinal assignment cannot race a
//! concurrent import touching the same shipment.

use crate::{
    db::DbPool,
    entities::{shipment, status_update, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    import::parser::RawStatusEvent,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionError,
    TransactionTrait,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{instrument, warn};

/// How a list of new events combines with existing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Add to the end of existing history, skipping duplicates.
    Append,
    /// Discard existing history and substitute the new list wholesale.
    ReplaceAll,
}

/// A status event ready for reconciliation, before ordinal assignment.
#[derive(Debug, Clone)]
pub struct NewStatusEvent {
    /// Absent means "no status change": the created row takes the shipment's
    /// current status and the denormalized projection is left as-is.
    pub status: Option<OrderStatus>,
    pub details: Option<String>,
    pub location: Option<String>,
    /// Absent means the source carried nothing parseable; the merge
    /// wall-clock is substituted at insert time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewStatusEvent {
    /// Converts a parsed CSV event. The parsed location text lands in
    /// `details`: it is the only free text the CSV supplies, and `details`
    /// participates in duplicate detection.
    pub fn from_raw(raw: &RawStatusEvent) -> Result<Self, ServiceError> {
        Ok(Self {
            status: Some(raw.status_type.parse()?),
            details: raw.location.clone(),
            location: None,
            timestamp: raw.parsed_timestamp(),
        })
    }
}

/// Result of one merge call.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub shipment: shipment::Model,
    /// Full history after the merge, newest ordinal first.
    pub history: Vec<status_update::Model>,
    pub inserted: usize,
    pub skipped_duplicates: usize,
}

/// Service for merging status events into persisted shipment history
#[derive(Clone)]
pub struct ReconciliationService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl ReconciliationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Merges `events` into the shipment's history under the given mode.
    ///
    /// Append mode assigns ordinals starting at `count + 1` and skips events
    /// whose `(status, timestamp, details)` tuple already exists for the
    /// shipment, so re-running the same import cannot duplicate history.
    /// Replace-all mode supersedes prior history with ordinals `1..=N`.
    /// A missing shipment is a per-call `NotFound`, never a process failure.
    #[instrument(skip(self, events), fields(count = events.len()))]
    pub async fn merge_events(
        &self,
        shipment_id: i32,
        events: &[NewStatusEvent],
        mode: MergeMode,
    ) -> Result<MergeOutcome, ServiceError> {
        let now = Utc::now();
        let events = events.to_vec();

        let outcome = self
            .db_pool
            .transaction::<_, MergeOutcome, ServiceError>(|txn| {
                Box::pin(async move {
                    let found = shipment::Entity::find_by_id(shipment_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Shipment {shipment_id} not found"))
                        })?;

                    match mode {
                        MergeMode::Append => append_events(txn, found, &events, now).await,
                        MergeMode::ReplaceAll => replace_history(txn, found, &events, now).await,
                    }
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.emit_merge_event(&outcome, mode).await;
        Ok(outcome)
    }

    /// Appends a single status event, the operator-action entry point.
    #[instrument(skip(self, event))]
    pub async fn append_event(
        &self,
        shipment_id: i32,
        event: NewStatusEvent,
    ) -> Result<MergeOutcome, ServiceError> {
        self.merge_events(shipment_id, std::slice::from_ref(&event), MergeMode::Append)
            .await
    }

    /// Appends a single status event to the shipment a tracking string
    /// resolves to. Used by imports keyed on tracking ids rather than
    /// internal ids.
    #[instrument(skip(self, event))]
    pub async fn append_event_by_tracking(
        &self,
        tracking_id: &str,
        event: NewStatusEvent,
    ) -> Result<MergeOutcome, ServiceError> {
        let found = super::tracking::resolve_shipment(&self.db_pool, tracking_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No shipment matches tracking id {tracking_id:?}"))
            })?;
        self.append_event(found.id, event).await
    }

    async fn emit_merge_event(&self, outcome: &MergeOutcome, mode: MergeMode) {
        let event = match mode {
            MergeMode::Append => match outcome.history.first() {
                Some(tail) if outcome.inserted > 0 => Event::StatusAppended {
                    shipment_id: outcome.shipment.id,
                    status: tail.order_status,
                    ord: tail.status_update_ord,
                },
                _ => return,
            },
            MergeMode::ReplaceAll => Event::HistoryReplaced {
                shipment_id: outcome.shipment.id,
                count: outcome.inserted,
            },
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to emit merge event");
        }
    }
}

async fn append_events(
    txn: &sea_orm::DatabaseTransaction,
    found: shipment::Model,
    events: &[NewStatusEvent],
    now: DateTime<Utc>,
) -> Result<MergeOutcome, ServiceError> {
    let existing = status_update::Entity::find()
        .filter(status_update::Column::ShipmentId.eq(found.id))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut seen: HashSet<(OrderStatus, DateTime<Utc>, Option<String>)> = existing
        .iter()
        .map(|row| (row.order_status, row.timestamp, row.details.clone()))
        .collect();

    let mut next_ord = existing.len() as i32 + 1;
    let mut inserted = 0;
    let mut skipped_duplicates = 0;
    let mut tail_status = None;

    for event in events {
        let status = event.status.unwrap_or(found.order_status);
        let timestamp = event.timestamp.unwrap_or(now);
        let key = (status, timestamp, event.details.clone());
        if seen.contains(&key) {
            skipped_duplicates += 1;
            continue;
        }

        insert_row(txn, found.id, event, status, timestamp, next_ord, now).await?;
        seen.insert(key);
        next_ord += 1;
        inserted += 1;
        tail_status = Some(status);
    }

    let updated = match tail_status {
        Some(status) => set_current_status(txn, found, status, now).await?,
        None => found,
    };

    finish(txn, updated, inserted, skipped_duplicates).await
}

async fn replace_history(
    txn: &sea_orm::DatabaseTransaction,
    found: shipment::Model,
    events: &[NewStatusEvent],
    now: DateTime<Utc>,
) -> Result<MergeOutcome, ServiceError> {
    status_update::Entity::delete_many()
        .filter(status_update::Column::ShipmentId.eq(found.id))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut tail_status = None;
    for (idx, event) in events.iter().enumerate() {
        let status = event.status.unwrap_or(found.order_status);
        let timestamp = event.timestamp.unwrap_or(now);
        insert_row(txn, found.id, event, status, timestamp, idx as i32 + 1, now).await?;
        tail_status = Some(status);
    }

    let inserted = events.len();
    let updated = match tail_status {
        Some(status) => set_current_status(txn, found, status, now).await?,
        None => found,
    };

    finish(txn, updated, inserted, 0).await
}

async fn insert_row(
    txn: &sea_orm::DatabaseTransaction,
    shipment_id: i32,
    event: &NewStatusEvent,
    status: OrderStatus,
    timestamp: DateTime<Utc>,
    ord: i32,
    now: DateTime<Utc>,
) -> Result<status_update::Model, ServiceError> {
    status_update::ActiveModel {
        shipment_id: Set(shipment_id),
        order_status: Set(status),
        details: Set(event.details.clone()),
        location: Set(event.location.clone()),
        timestamp: Set(timestamp),
        status_update_ord: Set(ord),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(ServiceError::db_error)
}

async fn set_current_status(
    txn: &sea_orm::DatabaseTransaction,
    found: shipment::Model,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<shipment::Model, ServiceError> {
    let mut active: shipment::ActiveModel = found.into();
    active.order_status = Set(status);
    active.updated_at = Set(Some(now));
    active.update(txn).await.map_err(ServiceError::db_error)
}

async fn finish(
    txn: &sea_orm::DatabaseTransaction,
    updated: shipment::Model,
    inserted: usize,
    skipped_duplicates: usize,
) -> Result<MergeOutcome, ServiceError> {
    let history = status_update::Entity::find()
        .filter(status_update::Column::ShipmentId.eq(updated.id))
        .order_by_desc(status_update::Column::StatusUpdateOrd)
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(MergeOutcome {
        shipment: updated,
        history,
        inserted,
        skipped_duplicates,
    })
}
