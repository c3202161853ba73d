use crate::{db::DbPool, entities::customer, errors::ServiceError};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::instrument;

const UNKNOWN: &str = "Unknown";

/// Service for managing customers
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Gets a customer by ID
    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: i32) -> Result<Option<customer::Model>, ServiceError> {
        let db = &*self.db_pool;
        let found = customer::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(found)
    }

    /// Resolves a customer by address, creating one with placeholder contact
    /// fields when no match exists. The address is a best-effort lookup key,
    /// not a strong identity; imports have nothing better to match on.
    #[instrument(skip(self))]
    pub async fn upsert_by_address(&self, address: &str) -> Result<customer::Model, ServiceError> {
        let db = &*self.db_pool;
        if let Some(existing) = customer::Entity::find()
            .filter(customer::Column::Address.eq(address))
            .order_by_asc(customer::Column::Id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            return Ok(existing);
        }

        let created = customer::ActiveModel {
            name: Set(UNKNOWN.to_string()),
            address: Set(address.to_string()),
            phone: Set(UNKNOWN.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        Ok(created)
    }

    /// Inserts or updates a customer under a caller-supplied id, preserving
    /// cross-references from a legacy dump. Absent attributes fall back to
    /// placeholders on insert and are left untouched on update.
    #[instrument(skip(self, name, address, phone))]
    pub async fn upsert_with_id(
        &self,
        id: i32,
        name: Option<String>,
        address: Option<String>,
        phone: Option<String>,
    ) -> Result<customer::Model, ServiceError> {
        let db = &*self.db_pool;
        match customer::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            Some(existing) => {
                let mut active: customer::ActiveModel = existing.into();
                if let Some(name) = name {
                    active.name = Set(name);
                }
                if let Some(address) = address {
                    active.address = Set(address);
                }
                if let Some(phone) = phone {
                    active.phone = Set(phone);
                }
                active.updated_at = Set(Some(Utc::now()));
                active.update(db).await.map_err(ServiceError::db_error)
            }
            None => customer::ActiveModel {
                id: Set(id),
                name: Set(name.unwrap_or_else(|| UNKNOWN.to_string())),
                address: Set(address.unwrap_or_else(|| UNKNOWN.to_string())),
                phone: Set(phone.unwrap_or_else(|| UNKNOWN.to_string())),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error),
        }
    }
}
