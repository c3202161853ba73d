//! Batch import orchestration.
//!
//! Drives the tokenizer, identity resolution, and the reconciler over a
//! batch of input rows, isolating per-row failures so one bad row cannot
//! abort the batch. A batch call fails only on infrastructure errors;
//! everything else lands in the per-row manifest, which callers must inspect
//! because batch-level success does not imply all rows succeeded.

use crate::{
    db::DbPool,
    entities::{shipment, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    import::csv::{read_shipment_rows, CsvRecord, CsvShipmentRow},
    import::legacy::{flatten, FlatLegacyShipment, LegacyDump},
    import::parser::{parse_flexible_date, parse_status_updates},
    services::customers::CustomerService,
    services::reconciliation::{MergeMode, NewStatusEvent, ReconciliationService},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Per-row outcome entry of a batch import manifest.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// The row's identifying key: order id, tracking id, shipment id, or a
    /// line reference when the row never parsed far enough to have one.
    pub key: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "updatedStatusCount", skip_serializing_if = "Option::is_none")]
    pub updated_status_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
}

impl RowOutcome {
    fn applied(key: String, updated_status_count: usize, order_status: OrderStatus) -> Self {
        Self {
            key,
            success: true,
            error: None,
            updated_status_count: Some(updated_status_count),
            order_status: Some(order_status),
        }
    }

    fn failed(key: String, error: String) -> Self {
        Self {
            key,
            success: false,
            error: Some(error),
            updated_status_count: None,
            order_status: None,
        }
    }
}

/// Manifest returned by the CSV and legacy-dump flows.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl ImportReport {
    fn from_outcomes(outcomes: Vec<RowOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        Self {
            processed: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }
}

/// One entry of the append-mode bulk update payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusUpdateRequest {
    #[serde(rename = "shipmentId")]
    #[validate(range(min = 1, message = "Shipment id must be positive"))]
    pub shipment_id: i32,
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Manifest returned by the append-mode bulk update flow. Requests whose
/// shipment id does not resolve are counted in `skipped` and omitted from
/// `outcomes`; this path is best-effort by contract.
#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdateReport {
    pub applied: usize,
    pub skipped: usize,
    pub outcomes: Vec<RowOutcome>,
}

/// Service orchestrating batch imports
#[derive(Clone)]
pub struct ImportService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    customers: CustomerService,
    reconciliation: ReconciliationService,
}

impl ImportService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            customers: CustomerService::new(db_pool.clone()),
            reconciliation: ReconciliationService::new(db_pool.clone(), event_sender.clone()),
            db_pool,
            event_sender,
        }
    }

    /// Imports a batch of already-parsed CSV rows. Rows are processed
    /// sequentially; reconciliation reads then writes per-shipment state, so
    /// rows touching the same shipment must not interleave.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_shipments(
        &self,
        rows: Vec<CsvShipmentRow>,
        mode: MergeMode,
    ) -> Result<ImportReport, ServiceError> {
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            outcomes.push(self.run_csv_row(row, mode).await?);
        }
        self.finish_report(outcomes).await
    }

    /// Reads and imports a CSV export file. Malformed records become failed
    /// manifest entries keyed by line number; only an unreadable file aborts.
    #[instrument(skip(self))]
    pub async fn import_csv_file(
        &self,
        path: &Path,
        mode: MergeMode,
    ) -> Result<ImportReport, ServiceError> {
        let records = read_shipment_rows(path)?;
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            match record {
                CsvRecord::Valid(row) => outcomes.push(self.run_csv_row(row, mode).await?),
                CsvRecord::Invalid { line, message } => {
                    warn!(line, %message, "malformed csv record");
                    outcomes.push(RowOutcome::failed(format!("line {line}"), message));
                }
            }
        }
        self.finish_report(outcomes).await
    }

    /// Imports a legacy bulk JSON dump, preserving caller-supplied ids.
    /// Every shipment's history is replaced wholesale; replace-all is
    /// naturally idempotent for migration re-runs.
    #[instrument(skip(self, dump))]
    pub async fn import_legacy_dump(&self, dump: LegacyDump) -> Result<ImportReport, ServiceError> {
        let records = flatten(dump);
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let key = record.id.to_string();
            match self.import_legacy_record(record).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => {
                    warn!(key = %key, error = %e, "legacy record import failed");
                    outcomes.push(RowOutcome::failed(key, e.to_string()));
                }
            }
        }
        self.finish_report(outcomes).await
    }

    /// Applies append-mode status updates, best-effort. Requests referencing
    /// a shipment that does not exist are skipped silently rather than
    /// reported as failures; the CSV flow reports such rows explicitly.
    #[instrument(skip(self, updates), fields(updates = updates.len()))]
    pub async fn apply_status_updates(
        &self,
        updates: Vec<StatusUpdateRequest>,
    ) -> Result<BulkUpdateReport, ServiceError> {
        let mut applied = 0;
        let mut skipped = 0;
        let mut outcomes = Vec::new();

        for update in updates {
            let key = update.shipment_id.to_string();
            if let Err(e) = update.validate() {
                outcomes.push(RowOutcome::failed(key, e.to_string()));
                continue;
            }

            let event = NewStatusEvent {
                status: update.order_status,
                details: update.details,
                location: update.location,
                timestamp: update.timestamp,
            };
            match self.reconciliation.append_event(update.shipment_id, event).await {
                Ok(outcome) => {
                    applied += 1;
                    outcomes.push(RowOutcome::applied(
                        key,
                        outcome.inserted,
                        outcome.shipment.order_status,
                    ));
                }
                Err(ServiceError::NotFound(_)) => {
                    debug!(shipment_id = update.shipment_id, "shipment not found, update skipped");
                    skipped += 1;
                }
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => {
                    warn!(key = %key, error = %e, "bulk status update failed");
                    outcomes.push(RowOutcome::failed(key, e.to_string()));
                }
            }
        }

        info!(applied, skipped, "bulk status updates applied");
        Ok(BulkUpdateReport {
            applied,
            skipped,
            outcomes,
        })
    }

    async fn run_csv_row(
        &self,
        row: CsvShipmentRow,
        mode: MergeMode,
    ) -> Result<RowOutcome, ServiceError> {
        let key = row.order_id.clone();
        match self.import_csv_row(&row, mode).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_infrastructure() => Err(e),
            Err(e) => {
                warn!(key = %key, error = %e, "import row failed");
                Ok(RowOutcome::failed(key, e.to_string()))
            }
        }
    }

    async fn import_csv_row(
        &self,
        row: &CsvShipmentRow,
        mode: MergeMode,
    ) -> Result<RowOutcome, ServiceError> {
        if row.order_id.trim().is_empty() {
            return Err(ServiceError::ValidationError("Order id is required".to_string()));
        }

        let customer_id = if row.address.trim().is_empty() {
            None
        } else {
            Some(self.customers.upsert_by_address(row.address.trim()).await?.id)
        };

        let estimated_delivery = row
            .estimated_delivery_text()
            .and_then(parse_flexible_date);

        let owner = self
            .upsert_by_order_id(row, customer_id, estimated_delivery)
            .await?;

        let events = row
            .status_updates
            .as_deref()
            .map(|raw| {
                parse_status_updates(raw)
                    .map(|parsed| NewStatusEvent::from_raw(&parsed))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let outcome = self.reconciliation.merge_events(owner.id, &events, mode).await?;

        Ok(RowOutcome::applied(
            row.order_id.clone(),
            outcome.inserted,
            outcome.shipment.order_status,
        ))
    }

    async fn upsert_by_order_id(
        &self,
        row: &CsvShipmentRow,
        customer_id: Option<i32>,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let existing = shipment::Entity::find()
            .filter(shipment::Column::OrderId.eq(row.order_id.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(found) => {
                let mut active: shipment::ActiveModel = found.into();
                active.tracking_id = Set(row.tracking_id.clone());
                if customer_id.is_some() {
                    active.customer_id = Set(customer_id);
                }
                if estimated_delivery.is_some() {
                    active.estimated_delivery = Set(estimated_delivery);
                }
                active.updated_at = Set(Some(now));
                active.update(db).await.map_err(ServiceError::db_error)
            }
            None => shipment::ActiveModel {
                order_id: Set(row.order_id.clone()),
                tracking_id: Set(row.tracking_id.clone()),
                customer_id: Set(customer_id),
                delivery_address: Set(Some(row.address.clone()).filter(|a| !a.trim().is_empty())),
                order_date: Set(now),
                estimated_delivery: Set(estimated_delivery),
                order_status: Set(OrderStatus::YetToBePicked),
                is_published: Set(true),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error),
        }
    }

    async fn import_legacy_record(
        &self,
        record: FlatLegacyShipment,
    ) -> Result<RowOutcome, ServiceError> {
        let customer_id = match &record.customer {
            Some(customer) => Some(
                self.customers
                    .upsert_with_id(
                        customer.id,
                        customer.name.clone(),
                        customer.address.clone(),
                        customer.phone.clone(),
                    )
                    .await?
                    .id,
            ),
            None => None,
        };

        let status = record
            .order_status
            .as_deref()
            .map(str::parse::<OrderStatus>)
            .transpose()?;

        let owner = self.upsert_with_id(&record, customer_id, status).await?;

        let events = record
            .status_updates
            .iter()
            .map(|update| {
                Ok(NewStatusEvent {
                    status: update
                        .order_status
                        .as_deref()
                        .map(str::parse::<OrderStatus>)
                        .transpose()?,
                    details: update.details.clone(),
                    location: update.location.clone(),
                    timestamp: update.timestamp,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let outcome = self
            .reconciliation
            .merge_events(owner.id, &events, MergeMode::ReplaceAll)
            .await?;

        Ok(RowOutcome::applied(
            record.id.to_string(),
            outcome.inserted,
            outcome.shipment.order_status,
        ))
    }

    async fn upsert_with_id(
        &self,
        record: &FlatLegacyShipment,
        customer_id: Option<i32>,
        status: Option<OrderStatus>,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        match shipment::Entity::find_by_id(record.id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            Some(found) => {
                let mut active: shipment::ActiveModel = found.into();
                active.order_id = Set(record.order_id.clone());
                active.tracking_id = Set(record.tracking_id.clone());
                if customer_id.is_some() {
                    active.customer_id = Set(customer_id);
                }
                if let Some(order_date) = record.order_date {
                    active.order_date = Set(order_date);
                }
                active.estimated_delivery = Set(record.estimated_delivery);
                active.origin_address = Set(record.origin_address.clone());
                active.updated_at = Set(Some(now));
                active.update(db).await.map_err(ServiceError::db_error)
            }
            None => shipment::ActiveModel {
                id: Set(record.id),
                order_id: Set(record.order_id.clone()),
                tracking_id: Set(record.tracking_id.clone()),
                customer_id: Set(customer_id),
                origin_address: Set(record.origin_address.clone()),
                order_date: Set(record.order_date.unwrap_or(now)),
                estimated_delivery: Set(record.estimated_delivery),
                order_status: Set(status.unwrap_or(OrderStatus::YetToBePicked)),
                is_published: Set(true),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error),
        }
    }

    async fn finish_report(&self, outcomes: Vec<RowOutcome>) -> Result<ImportReport, ServiceError> {
        let report = ImportReport::from_outcomes(outcomes);
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "import batch finished"
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ImportCompleted {
                processed: report.processed,
                succeeded: report.succeeded,
                failed: report.failed,
            })
            .await
        {
            warn!(error = %e, "failed to emit import completed event");
        }
        Ok(report)
    }
}
