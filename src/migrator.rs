use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_customers_table::Migration),
            Box::new(m20240101_000002_create_shipments_table::Migration),
            Box::new(m20240101_000003_create_status_updates_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_customers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Address).string().not_null())
                        .col(ColumnDef::new(Customers::Phone).string().not_null())
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt).timestamp_with_time_zone(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_address")
                        .table(Customers::Table)
                        .col(Customers::Address)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Customers {
        Table,
        Id,
        Name,
        Address,
        Phone,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_shipments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_shipments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipments::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Shipments::OrderId).string().not_null())
                        .col(ColumnDef::new(Shipments::TrackingId).string().not_null())
                        .col(ColumnDef::new(Shipments::CustomerId).integer())
                        .col(ColumnDef::new(Shipments::OriginAddress).string())
                        .col(ColumnDef::new(Shipments::DeliveryAddress).string())
                        .col(
                            ColumnDef::new(Shipments::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::EstimatedDelivery)
                                .timestamp_with_time_zone(),
                        )
                        .col(ColumnDef::new(Shipments::OrderStatus).text().not_null())
                        .col(
                            ColumnDef::new(Shipments::IsPublished)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Shipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::UpdatedAt).timestamp_with_time_zone(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_customer_id")
                                .from(Shipments::Table, Shipments::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_order_id")
                        .table(Shipments::Table)
                        .col(Shipments::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_tracking_id")
                        .table(Shipments::Table)
                        .col(Shipments::TrackingId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Shipments {
        Table,
        Id,
        OrderId,
        TrackingId,
        CustomerId,
        OriginAddress,
        DeliveryAddress,
        OrderDate,
        EstimatedDelivery,
        OrderStatus,
        IsPublished,
        CreatedAt,
        UpdatedAt,
    }

    use super::m20240101_000001_create_customers_table::Customers;
}

mod m20240101_000003_create_status_updates_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_status_updates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StatusUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StatusUpdates::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StatusUpdates::ShipmentId).integer().not_null())
                        .col(ColumnDef::new(StatusUpdates::OrderStatus).text().not_null())
                        .col(ColumnDef::new(StatusUpdates::Details).string())
                        .col(ColumnDef::new(StatusUpdates::Location).string())
                        .col(
                            ColumnDef::new(StatusUpdates::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StatusUpdates::StatusUpdateOrd)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StatusUpdates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_status_updates_shipment_id")
                                .from(StatusUpdates::Table, StatusUpdates::ShipmentId)
                                .to(Shipments::Table, Shipments::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Ordinal assignment races surface as constraint violations
            // instead of silently interleaving.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_status_updates_shipment_ord")
                        .table(StatusUpdates::Table)
                        .col(StatusUpdates::ShipmentId)
                        .col(StatusUpdates::StatusUpdateOrd)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StatusUpdates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StatusUpdates {
        Table,
        Id,
        ShipmentId,
        OrderStatus,
        Details,
        Location,
        Timestamp,
        StatusUpdateOrd,
        CreatedAt,
    }

    use super::m20240101_000002_create_shipments_table::Shipments;
}
