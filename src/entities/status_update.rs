use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::shipment::OrderStatus;

/// One discrete event in a shipment's lifecycle.
///
/// Rows are append-only: corrections are made by deleting and re-creating,
/// never by mutating in place.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status_updates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub shipment_id: i32,
    pub order_status: OrderStatus,
    pub details: Option<String>,
    pub location: Option<String>,

    /// Event time, best-effort parsed from the source; defaults to the merge
    /// wall-clock when the source carried nothing parseable.
    pub timestamp: DateTime<Utc>,

    /// 1-based position within the owning shipment's history. Unique per
    /// shipment and strictly increasing in insertion order, which is not
    /// necessarily `timestamp` order.
    pub status_update_ord: i32,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::shipment::Column::Id"
    )]
    Shipment,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
