use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ServiceError;

/// Shipment lifecycle status enumeration
///
/// The wire values are fixed; they appear verbatim in the database, in import
/// payloads, and in the options list served to UIs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    #[sea_orm(string_value = "yet_to_be_picked")]
    #[serde(rename = "yet_to_be_picked")]
    YetToBePicked,

    #[sea_orm(string_value = "picked_up")]
    #[serde(rename = "picked_up")]
    PickedUp,

    #[sea_orm(string_value = "intransit")]
    #[serde(rename = "intransit")]
    InTransit,

    #[sea_orm(string_value = "on_the_way")]
    #[serde(rename = "on_the_way")]
    OnTheWay,

    #[sea_orm(string_value = "out_for_delivery")]
    #[serde(rename = "out_for_delivery")]
    OutForDelivery,

    #[sea_orm(string_value = "delivered")]
    #[serde(rename = "delivered")]
    Delivered,

    #[sea_orm(string_value = "cancelled")]
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::YetToBePicked => "yet_to_be_picked",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::InTransit => "intransit",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::YetToBePicked => "Yet to be Picked",
            OrderStatus::PickedUp => "Picked Up",
            OrderStatus::InTransit => "In Transit",
            OrderStatus::OnTheWay => "On the Way",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Ordered `{value, label}` pairs for UI population.
    pub fn options() -> Vec<StatusOption> {
        OrderStatus::iter()
            .map(|status| StatusOption {
                value: status.as_str(),
                label: status.label(),
            })
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yet_to_be_picked" => Ok(OrderStatus::YetToBePicked),
            "picked_up" => Ok(OrderStatus::PickedUp),
            "intransit" => Ok(OrderStatus::InTransit),
            "on_the_way" => Ok(OrderStatus::OnTheWay),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ServiceError::InvalidStatus(other.to_string())),
        }
    }
}

/// One entry of the status options surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// External order reference; unique within this store.
    pub order_id: String,

    /// Carrier tracking code; lookup key for public tracking. Raw import data
    /// does not guarantee global uniqueness, see the tracking resolver.
    pub tracking_id: String,

    pub customer_id: Option<i32>,
    pub origin_address: Option<String>,
    pub delivery_address: Option<String>,
    pub order_date: DateTime<Utc>,
    pub estimated_delivery: Option<DateTime<Utc>>,

    /// Denormalized projection of the status history: always the status of
    /// the update with the highest ordinal while history is non-empty.
    pub order_status: OrderStatus,

    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::status_update::Entity")]
    StatusUpdates,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::status_update::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusUpdates.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_value() {
        for option in OrderStatus::options() {
            let parsed: OrderStatus = option.value.parse().unwrap();
            assert_eq!(parsed.as_str(), option.value);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("returned_to_sender".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn options_are_ordered_by_lifecycle() {
        let values: Vec<&str> = OrderStatus::options().iter().map(|o| o.value).collect();
        assert_eq!(
            values,
            vec![
                "yet_to_be_picked",
                "picked_up",
                "intransit",
                "on_the_way",
                "out_for_delivery",
                "delivered",
                "cancelled",
            ]
        );
    }
}
