#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_inventory_session_tables::Migration),
            Box::new(m20240101_000003_create_stock_movements_table::Migration),
            Box::new(m20240101_000004_create_indicator_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductCategories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductCategories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductCategories::OrganizationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductCategories::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().null())
                        .col(ColumnDef::new(Products::BaseUnit).string().not_null())
                        .col(ColumnDef::new(Products::AvgCost).decimal().null())
                        .col(
                            ColumnDef::new(Products::CurrentStock)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_org_active")
                        .table(Products::Table)
                        .col(Products::OrganizationId)
                        .col(Products::IsActive)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductCategories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        OrganizationId,
        Name,
        CategoryId,
        BaseUnit,
        AvgCost,
        CurrentStock,
        ImageUrl,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductCategories {
        Table,
        Id,
        OrganizationId,
        Name,
    }
}

mod m20240101_000002_create_inventory_session_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_inventory_session_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventorySessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventorySessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventorySessions::CostCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventorySessions::Status).string().not_null())
                        .col(
                            ColumnDef::new(InventorySessions::ShareToken)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(InventorySessions::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(InventorySessions::Notes).string().null())
                        .col(
                            ColumnDef::new(InventorySessions::StartedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventorySessions::EndedAt).timestamp().null())
                        .col(ColumnDef::new(InventorySessions::Precision).double().null())
                        .col(
                            ColumnDef::new(InventorySessions::ItemsCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventorySessions::ItemsCorrect)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // The single-open-session-per-cost-center guard. sea-query has no
            // portable partial-index builder; the statement below is valid on
            // both SQLite and Postgres.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS ux_inventory_sessions_open_cost_center \
                     ON inventory_sessions (cost_center_id) WHERE status = 'open'",
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_sessions_cost_center_status")
                        .table(InventorySessions::Table)
                        .col(InventorySessions::CostCenterId)
                        .col(InventorySessions::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventorySessionItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventorySessionItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::SessionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventorySessionItems::CategoryId).uuid().null())
                        .col(
                            ColumnDef::new(InventorySessionItems::CategoryName)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(InventorySessionItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(InventorySessionItems::CostPerUnit)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::ExpectedQuantity)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::CountedQuantity)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::Difference)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::IsCorrect)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(InventorySessionItems::CountedAt)
                                .timestamp()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_session_items_session")
                                .from(
                                    InventorySessionItems::Table,
                                    InventorySessionItems::SessionId,
                                )
                                .to(InventorySessions::Table, InventorySessions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_session_items_session_product_name")
                        .table(InventorySessionItems::Table)
                        .col(InventorySessionItems::SessionId)
                        .col(InventorySessionItems::ProductName)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventorySessionItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventorySessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventorySessions {
        Table,
        Id,
        CostCenterId,
        Status,
        ShareToken,
        CreatedBy,
        Notes,
        StartedAt,
        EndedAt,
        Precision,
        ItemsCount,
        ItemsCorrect,
    }

    #[derive(DeriveIden)]
    pub(super) enum InventorySessionItems {
        Table,
        Id,
        SessionId,
        ProductId,
        ProductName,
        CategoryId,
        CategoryName,
        Unit,
        CostPerUnit,
        ExpectedQuantity,
        CountedQuantity,
        Difference,
        IsCorrect,
        CountedAt,
    }
}

mod m20240101_000003_create_stock_movements_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Quantity).decimal().not_null())
                        .col(ColumnDef::new(StockMovements::Unit).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::TotalCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockMovements::StockBefore)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::StockAfter)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ReferenceType).string().null())
                        .col(ColumnDef::new(StockMovements::ReferenceId).uuid().null())
                        .col(ColumnDef::new(StockMovements::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::Notes).string().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_reference")
                        .table(StockMovements::Table)
                        .col(StockMovements::ReferenceType)
                        .col(StockMovements::ReferenceId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        ProductId,
        MovementType,
        Quantity,
        Unit,
        TotalCost,
        StockBefore,
        StockAfter,
        ReferenceType,
        ReferenceId,
        CreatedBy,
        Notes,
        CreatedAt,
    }
}

mod m20240101_000004_create_indicator_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_indicator_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Indicators::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Indicators::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Indicators::CostCenterId).uuid().not_null())
                        .col(ColumnDef::new(Indicators::Key).string().not_null())
                        .col(ColumnDef::new(Indicators::Name).string().not_null())
                        .col(
                            ColumnDef::new(Indicators::TargetValue)
                                .double()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Indicators::CurrentValue)
                                .double()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Indicators::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Indicators::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("ux_indicators_cost_center_key")
                        .table(Indicators::Table)
                        .col(Indicators::CostCenterId)
                        .col(Indicators::Key)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(IndicatorResults::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(IndicatorResults::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(IndicatorResults::IndicatorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(IndicatorResults::Value).double().not_null())
                        .col(
                            ColumnDef::new(IndicatorResults::TargetSnapshot)
                                .double()
                                .not_null(),
                        )
                        .col(ColumnDef::new(IndicatorResults::Date).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_indicator_results_indicator")
                                .from(IndicatorResults::Table, IndicatorResults::IndicatorId)
                                .to(Indicators::Table, Indicators::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_indicator_results_indicator_date")
                        .table(IndicatorResults::Table)
                        .col(IndicatorResults::IndicatorId)
                        .col(IndicatorResults::Date)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(IndicatorResults::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Indicators::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Indicators {
        Table,
        Id,
        CostCenterId,
        Key,
        Name,
        TargetValue,
        CurrentValue,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum IndicatorResults {
        Table,
        Id,
        IndicatorId,
        Value,
        TargetSnapshot,
        Date,
    }
}
