//! Tracking identity resolution.
//!
//! A shipment can be addressed by several variant spellings of its tracking
//! code: trimmed or untrimmed, with carrier-added prefixes or suffixes, or
//! with the separators stripped. Resolution tries progressively looser match
//! strategies and stops at the first hit, preferring precision over recall.

use crate::{
    db::DbPool,
    entities::{shipment, status_update},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// A resolved shipment together with its full history, newest ordinal first.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedShipment {
    pub shipment: shipment::Model,
    pub status_updates: Vec<status_update::Model>,
}

/// Resolves a user-supplied or imported tracking string to at most one
/// published shipment.
///
/// Strategies, in order, first hit wins:
/// 1. exact equality against the stored tracking code
/// 2. exact equality against the trimmed input
/// 3. stored code contains the input as a substring
/// 4. digit-stripped stored code contains the digit-stripped input
///
/// Ties within a strategy break on ascending shipment id, so resolution is
/// reproducible across runs. Containment is evaluated case-sensitively in
/// memory over candidates in id order; SQL `LIKE` collation varies by
/// backend and would make the match order backend-dependent.
pub async fn resolve_shipment(
    db: &DbPool,
    raw: &str,
) -> Result<Option<shipment::Model>, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Strategy 1: exact match on the input as given.
    if let Some(found) = find_by_exact(db, raw).await? {
        return Ok(Some(found));
    }

    // Strategy 2: exact match on the trimmed input.
    if trimmed != raw {
        if let Some(found) = find_by_exact(db, trimmed).await? {
            return Ok(Some(found));
        }
    }

    let candidates = shipment::Entity::find()
        .filter(shipment::Column::IsPublished.eq(true))
        .order_by_asc(shipment::Column::Id)
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    // Strategy 3: substring containment.
    if let Some(found) = candidates
        .iter()
        .find(|candidate| candidate.tracking_id.contains(trimmed))
    {
        return Ok(Some(found.clone()));
    }

    // Strategy 4: digits-only containment.
    let input_digits = digits_of(trimmed);
    if !input_digits.is_empty() {
        if let Some(found) = candidates
            .iter()
            .find(|candidate| digits_of(&candidate.tracking_id).contains(&input_digits))
        {
            return Ok(Some(found.clone()));
        }
    }

    Ok(None)
}

async fn find_by_exact(db: &DbPool, needle: &str) -> Result<Option<shipment::Model>, ServiceError> {
    shipment::Entity::find()
        .filter(shipment::Column::TrackingId.eq(needle))
        .filter(shipment::Column::IsPublished.eq(true))
        .order_by_asc(shipment::Column::Id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

fn digits_of(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Service for public shipment tracking
#[derive(Clone)]
pub struct TrackingService {
    db_pool: Arc<DbPool>,
}

impl TrackingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Resolves a tracking string and loads the shipment's full history,
    /// ordered by descending ordinal for display.
    #[instrument(skip(self))]
    pub async fn track(&self, raw: &str) -> Result<Option<TrackedShipment>, ServiceError> {
        let db = &*self.db_pool;
        let Some(found) = resolve_shipment(db, raw).await? else {
            return Ok(None);
        };

        let status_updates = status_update::Entity::find()
            .filter(status_update::Column::ShipmentId.eq(found.id))
            .order_by_desc(status_update::Column::StatusUpdateOrd)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Some(TrackedShipment {
            shipment: found,
            status_updates,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_stripping() {
        assert_eq!(digits_of("TRK-001-99"), "00199");
        assert_eq!(digits_of("no digits"), "");
    }
}
