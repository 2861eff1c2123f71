use sea_orm_migration::prelude::*;

// Money columns are decimal(16, 4); SQLite's DDL renderer rejects
// precision above 16.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_catalog_tables::Migration),
            Box::new(m20250301_000002_create_stock_tables::Migration),
            Box::new(m20250301_000003_create_transfer_tables::Migration),
            Box::new(m20250301_000004_create_approval_tables::Migration),
        ]
    }
}

mod m20250301_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::PurchasePrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::SellingPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::DeletedAt).timestamp())
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::DeletedAt).timestamp())
                        .col(ColumnDef::new(Warehouses::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RepairRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepairRequests::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RepairRequests::ActualCost).decimal_len(16, 4))
                        .col(ColumnDef::new(RepairRequests::DeletedAt).timestamp())
                        .col(
                            ColumnDef::new(RepairRequests::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairRequests::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RepairRequestServices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepairRequestServices::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RepairRequestServices::RepairRequestId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairRequestServices::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairRequestServices::Status)
                                .string()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InvoiceItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InvoiceItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::InvoiceId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InvoiceItems::PartsUsedId).big_integer())
                        .col(ColumnDef::new(InvoiceItems::Description).string().not_null())
                        .col(ColumnDef::new(InvoiceItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(InvoiceItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::Total)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(InvoiceItems::Table).to_owned(),
                Table::drop().table(RepairRequestServices::Table).to_owned(),
                Table::drop().table(RepairRequests::Table).to_owned(),
                Table::drop().table(Warehouses::Table).to_owned(),
                Table::drop().table(InventoryItems::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum InventoryItems {
        Table,
        Id,
        Name,
        Sku,
        PurchasePrice,
        SellingPrice,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        Name,
        DeletedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum RepairRequests {
        Table,
        Id,
        ActualCost,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RepairRequestServices {
        Table,
        Id,
        RepairRequestId,
        Price,
        Status,
    }

    #[derive(DeriveIden)]
    enum InvoiceItems {
        Table,
        Id,
        InvoiceId,
        PartsUsedId,
        Description,
        Quantity,
        UnitPrice,
        Total,
        CreatedAt,
    }
}

mod m20250301_000002_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLevels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLevels::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::InventoryItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLevels::MinLevel)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLevels::IsLowStock)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StockLevels::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // The row lock target: one row per (item, warehouse).
            manager
                .create_index(
                    Index::create()
                        .name("ux_stock_levels_item_warehouse")
                        .table(StockLevels::Table)
                        .col(StockLevels::InventoryItemId)
                        .col(StockLevels::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::InventoryItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(StockMovements::SignedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::FromWarehouseId).big_integer())
                        .col(ColumnDef::new(StockMovements::ToWarehouseId).big_integer())
                        .col(ColumnDef::new(StockMovements::ReferenceType).string())
                        .col(ColumnDef::new(StockMovements::ReferenceId).big_integer())
                        .col(ColumnDef::new(StockMovements::CreatedBy).big_integer())
                        .col(ColumnDef::new(StockMovements::Notes).string())
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
                        .name("ix_stock_movements_item_created")
                        .table(StockMovements::Table)
                        .col(StockMovements::InventoryItemId)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockAlerts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAlerts::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::InventoryItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAlerts::AlertType).string().not_null())
                        .col(ColumnDef::new(StockAlerts::Severity).string().not_null())
                        .col(ColumnDef::new(StockAlerts::Message).string().not_null())
                        .col(ColumnDef::new(StockAlerts::Status).string().not_null())
                        .col(
                            ColumnDef::new(StockAlerts::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAlerts::ResolvedAt).timestamp())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(StockAlerts::Table).to_owned(),
                Table::drop().table(StockMovements::Table).to_owned(),
                Table::drop().table(StockLevels::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum StockLevels {
        Table,
        Id,
        InventoryItemId,
        WarehouseId,
        Quantity,
        MinLevel,
        IsLowStock,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        InventoryItemId,
        MovementType,
        Quantity,
        SignedQuantity,
        FromWarehouseId,
        ToWarehouseId,
        ReferenceType,
        ReferenceId,
        CreatedBy,
        Notes,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StockAlerts {
        Table,
        Id,
        InventoryItemId,
        WarehouseId,
        AlertType,
        Severity,
        Message,
        Status,
        CreatedAt,
        UpdatedAt,
        ResolvedAt,
    }
}

mod m20250301_000003_create_transfer_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_transfer_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransfers::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::TransferNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::FromWarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::ToWarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransfers::Status).string().not_null())
                        .col(ColumnDef::new(StockTransfers::Reason).string())
                        .col(ColumnDef::new(StockTransfers::Notes).string())
                        .col(
                            ColumnDef::new(StockTransfers::RequestedBy)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransfers::ApprovedBy).big_integer())
                        .col(ColumnDef::new(StockTransfers::ShippedBy).big_integer())
                        .col(ColumnDef::new(StockTransfers::ShippedAt).timestamp())
                        .col(ColumnDef::new(StockTransfers::ReceivedBy).big_integer())
                        .col(ColumnDef::new(StockTransfers::ReceivedAt).timestamp())
                        .col(
                            ColumnDef::new(StockTransfers::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransferItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransferItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::TransferId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::InventoryItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransferItems::Notes).string())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransferSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferSequences::Year)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransferSequences::LastSeq)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(TransferSequences::Table).to_owned(),
                Table::drop().table(StockTransferItems::Table).to_owned(),
                Table::drop().table(StockTransfers::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum StockTransfers {
        Table,
        Id,
        TransferNumber,
        FromWarehouseId,
        ToWarehouseId,
        Status,
        Reason,
        Notes,
        RequestedBy,
        ApprovedBy,
        ShippedBy,
        ShippedAt,
        ReceivedBy,
        ReceivedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockTransferItems {
        Table,
        Id,
        TransferId,
        InventoryItemId,
        Quantity,
        Notes,
    }

    #[derive(DeriveIden)]
    enum TransferSequences {
        Table,
        Year,
        LastSeq,
    }
}

mod m20250301_000004_create_approval_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_approval_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PartsUsed::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PartsUsed::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PartsUsed::RepairRequestId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PartsUsed::InventoryItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PartsUsed::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PartsUsed::Quantity).integer().not_null())
                        .col(ColumnDef::new(PartsUsed::Status).string().not_null())
                        .col(
                            ColumnDef::new(PartsUsed::UnitPurchasePrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PartsUsed::UnitSellingPrice).decimal_len(16, 4))
                        .col(
                            ColumnDef::new(PartsUsed::TotalCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PartsUsed::TotalPrice).decimal_len(16, 4))
                        .col(ColumnDef::new(PartsUsed::Profit).decimal_len(16, 4))
                        .col(ColumnDef::new(PartsUsed::SerialNumber).string())
                        .col(ColumnDef::new(PartsUsed::Notes).string())
                        .col(ColumnDef::new(PartsUsed::RequestedBy).big_integer())
                        .col(ColumnDef::new(PartsUsed::ApprovedBy).big_integer())
                        .col(ColumnDef::new(PartsUsed::ApprovedAt).timestamp())
                        .col(ColumnDef::new(PartsUsed::InvoiceItemId).big_integer())
                        .col(ColumnDef::new(PartsUsed::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(PartsUsed::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RepairPartsApprovals::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepairPartsApprovals::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RepairPartsApprovals::PartsUsedId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairPartsApprovals::RepairRequestId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairPartsApprovals::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairPartsApprovals::Priority)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairPartsApprovals::TotalCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairPartsApprovals::ApproverRole)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RepairPartsApprovals::RequestedBy).big_integer())
                        .col(ColumnDef::new(RepairPartsApprovals::ApprovedBy).big_integer())
                        .col(ColumnDef::new(RepairPartsApprovals::Reason).string())
                        .col(
                            ColumnDef::new(RepairPartsApprovals::RequestedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RepairPartsApprovals::ReviewedAt).timestamp())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(RepairPartsApprovals::Table).to_owned(),
                Table::drop().table(PartsUsed::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum PartsUsed {
        Table,
        Id,
        RepairRequestId,
        InventoryItemId,
        WarehouseId,
        Quantity,
        Status,
        UnitPurchasePrice,
        UnitSellingPrice,
        TotalCost,
        TotalPrice,
        Profit,
        SerialNumber,
        Notes,
        RequestedBy,
        ApprovedBy,
        ApprovedAt,
        InvoiceItemId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RepairPartsApprovals {
        Table,
        Id,
        PartsUsedId,
        RepairRequestId,
        Status,
        Priority,
        TotalCost,
        ApproverRole,
        RequestedBy,
        ApprovedBy,
        Reason,
        RequestedAt,
        ReviewedAt,
    }
}
