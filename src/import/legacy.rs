//! Flattening for legacy bulk JSON dumps.
//!
//! The legacy export nests every record as `{id, attributes}` and wraps
//! relations in `{data: ...}` envelopes. Depending on which system produced
//! the dump, a relation may be a wrapped object, a bare numeric id, or
//! absent entirely; [`normalize_relation`] is the single place that collapses
//! those representations. Flattening preserves the caller-supplied numeric
//! ids so cross-references from the legacy source survive the migration.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Root of a legacy bulk export document.
#[derive(Debug, Deserialize)]
pub struct LegacyDump {
    pub data: Vec<LegacyShipmentEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyShipmentEntry {
    pub id: i32,
    pub attributes: LegacyShipmentAttributes,
}

#[derive(Debug, Deserialize)]
pub struct LegacyShipmentAttributes {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "trackingId")]
    pub tracking_id: String,
    #[serde(rename = "orderDate", default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(rename = "estimatedDelivery", default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(rename = "originAddress", default)]
    pub origin_address: Option<String>,
    #[serde(default)]
    pub customer: Option<RawRelation<LegacyCustomerAttributes>>,
    #[serde(default)]
    pub status_updates: RelationList<LegacyStatusUpdateAttributes>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyCustomerAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyStatusUpdateAttributes {
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A relation payload exactly as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawRelation<T> {
    Wrapped { data: Option<RelationData<T>> },
    Bare(i32),
}

#[derive(Debug, Deserialize)]
pub struct RelationData<T> {
    pub id: i32,
    pub attributes: T,
}

/// A `{data: [...]}` envelope around a list of related records.
#[derive(Debug, Deserialize)]
pub struct RelationList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<RelationData<T>>,
}

impl<T> Default for RelationList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

/// The one normalized relation shape reconciliation works against.
#[derive(Debug)]
pub enum RelationRef<T> {
    None,
    ById(i32),
    ByObject(i32, T),
}

/// Collapses every wire representation of a relation into [`RelationRef`].
pub fn normalize_relation<T>(raw: Option<RawRelation<T>>) -> RelationRef<T> {
    match raw {
        None => RelationRef::None,
        Some(RawRelation::Bare(id)) => RelationRef::ById(id),
        Some(RawRelation::Wrapped { data: None }) => RelationRef::None,
        Some(RawRelation::Wrapped { data: Some(data) }) => {
            RelationRef::ByObject(data.id, data.attributes)
        }
    }
}

/// A shipment record flattened out of the nested dump, ready for
/// reconciliation.
#[derive(Debug)]
pub struct FlatLegacyShipment {
    pub id: i32,
    pub order_id: String,
    pub tracking_id: String,
    pub order_date: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub order_status: Option<String>,
    pub origin_address: Option<String>,
    pub customer: Option<FlatLegacyCustomer>,
    pub status_updates: Vec<FlatLegacyStatusUpdate>,
}

#[derive(Debug)]
pub struct FlatLegacyCustomer {
    pub id: i32,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug)]
pub struct FlatLegacyStatusUpdate {
    pub id: i32,
    pub order_status: Option<String>,
    pub details: Option<String>,
    pub location: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Flattens the nested dump into flat per-shipment records, preserving source
/// order of both shipments and their status updates.
pub fn flatten(dump: LegacyDump) -> Vec<FlatLegacyShipment> {
    dump.data
        .into_iter()
        .map(|entry| {
            let attrs = entry.attributes;
            let customer = match normalize_relation(attrs.customer) {
                RelationRef::None => None,
                RelationRef::ById(id) => Some(FlatLegacyCustomer {
                    id,
                    name: None,
                    address: None,
                    phone: None,
                }),
                RelationRef::ByObject(id, c) => Some(FlatLegacyCustomer {
                    id,
                    name: c.name,
                    address: c.address,
                    phone: c.phone,
                }),
            };
            let status_updates = attrs
                .status_updates
                .data
                .into_iter()
                .map(|s| FlatLegacyStatusUpdate {
                    id: s.id,
                    order_status: s.attributes.order_status,
                    details: s.attributes.details,
                    location: s.attributes.location,
                    timestamp: s.attributes.timestamp,
                })
                .collect();

            FlatLegacyShipment {
                id: entry.id,
                order_id: attrs.order_id,
                tracking_id: attrs.tracking_id,
                order_date: attrs.order_date,
                estimated_delivery: attrs.estimated_delivery,
                order_status: attrs.order_status,
                origin_address: attrs.origin_address,
                customer,
                status_updates,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_wrapped_customer_and_status_updates() {
        let doc = serde_json::json!({
            "data": [{
                "id": 42,
                "attributes": {
                    "orderId": "O-42",
                    "trackingId": "TRK-42",
                    "orderDate": "2024-01-15T00:00:00Z",
                    "order_status": "intransit",
                    "customer": {"data": {"id": 7, "attributes": {"name": "Ada", "address": "1 Loop Rd", "phone": "555"}}},
                    "status_updates": {"data": [
                        {"id": 100, "attributes": {"order_status": "picked_up", "timestamp": "2024-01-16T08:00:00Z"}},
                        {"id": 101, "attributes": {"order_status": "intransit", "details": "sorted"}}
                    ]}
                }
            }]
        });
        let dump: LegacyDump = serde_json::from_value(doc).unwrap();
        let flat = flatten(dump);

        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].id, 42);
        let customer = flat[0].customer.as_ref().unwrap();
        assert_eq!(customer.id, 7);
        assert_eq!(customer.name.as_deref(), Some("Ada"));
        assert_eq!(flat[0].status_updates.len(), 2);
        assert_eq!(flat[0].status_updates[0].id, 100);
        assert_eq!(
            flat[0].status_updates[1].details.as_deref(),
            Some("sorted")
        );
    }

    #[test]
    fn bare_id_relation_normalizes_to_by_id() {
        let doc = serde_json::json!({
            "data": [{
                "id": 5,
                "attributes": {
                    "orderId": "O-5",
                    "trackingId": "TRK-5",
                    "customer": 31
                }
            }]
        });
        let dump: LegacyDump = serde_json::from_value(doc).unwrap();
        let flat = flatten(dump);
        let customer = flat[0].customer.as_ref().unwrap();
        assert_eq!(customer.id, 31);
        assert!(customer.name.is_none());
    }

    #[test]
    fn absent_and_null_relations_normalize_to_none() {
        let doc = serde_json::json!({
            "data": [
                {"id": 1, "attributes": {"orderId": "O-1", "trackingId": "T-1"}},
                {"id": 2, "attributes": {"orderId": "O-2", "trackingId": "T-2", "customer": {"data": null}}}
            ]
        });
        let dump: LegacyDump = serde_json::from_value(doc).unwrap();
        let flat = flatten(dump);
        assert!(flat[0].customer.is_none());
        assert!(flat[1].customer.is_none());
        assert!(flat[0].status_updates.is_empty());
    }
}
