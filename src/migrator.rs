use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_tenancy_tables::Migration),
            Box::new(m20240101_000002_create_inventory_tables::Migration),
            Box::new(m20240101_000003_create_transaction_tables::Migration),
            Box::new(m20240101_000004_create_procurement_tables::Migration),
            Box::new(m20240101_000005_create_category_tables::Migration),
            Box::new(m20240101_000006_create_platform_listings_table::Migration),
        ]
    }
}

fn created_at<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

fn money<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(16, 4)
        .not_null()
        .default(0)
        .to_owned()
}

fn version<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).integer().not_null().default(1).to_owned()
}

mod m20240101_000001_create_tenancy_tables {
    use super::created_at;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_tenancy_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::Code).string().not_null().unique_key())
                        .col(created_at(Stores::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Warehouses::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Warehouses::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::Code).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(created_at(Warehouses::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vendors::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Vendors::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Vendors::Name).string().not_null())
                        .col(ColumnDef::new(Vendors::Email).string().null())
                        .col(ColumnDef::new(Vendors::Phone).string().null())
                        .col(created_at(Vendors::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Products::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().null())
                        .col(ColumnDef::new(Products::Title).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(super::money(Products::Price))
                        .col(created_at(Products::CreatedAt))
                        .col(created_at(Products::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::Sku).string().not_null())
                        .col(ColumnDef::new(ProductVariants::Title).string().not_null())
                        .col(super::money(ProductVariants::Price))
                        .col(super::money(ProductVariants::Cost))
                        .col(created_at(ProductVariants::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_variants_product")
                                .from(ProductVariants::Table, ProductVariants::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StoreSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StoreSequences::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StoreSequences::StoreId).uuid().not_null())
                        .col(ColumnDef::new(StoreSequences::Scope).string().not_null())
                        .col(
                            ColumnDef::new(StoreSequences::NextValue)
                                .big_integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_store_sequences_store_scope")
                        .table(StoreSequences::Table)
                        .col(StoreSequences::StoreId)
                        .col(StoreSequences::Scope)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_store_id")
                        .table(Products::Table)
                        .col(Products::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StoreSequences::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
        Name,
        Code,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        StoreId,
        Name,
        Code,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Vendors {
        Table,
        Id,
        StoreId,
        Name,
        Email,
        Phone,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        StoreId,
        CategoryId,
        Title,
        Description,
        Price,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductVariants {
        Table,
        Id,
        ProductId,
        Sku,
        Title,
        Price,
        Cost,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StoreSequences {
        Table,
        Id,
        StoreId,
        Scope,
        NextValue,
    }
}

mod m20240101_000002_create_inventory_tables {
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Inventory::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Inventory::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Inventory::ProductVariantId).uuid().not_null())
                        .col(ColumnDef::new(Inventory::WarehouseId).uuid().not_null())
                        .col(
                            ColumnDef::new(Inventory::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::ReservedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(money(Inventory::UnitCost))
                        .col(
                            ColumnDef::new(Inventory::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Inventory::BinLocation).string().null())
                        .col(
                            ColumnDef::new(Inventory::LastCountedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(created_at(Inventory::CreatedAt))
                        .col(created_at(Inventory::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_variant_warehouse")
                        .table(Inventory::Table)
                        .col(Inventory::ProductVariantId)
                        .col(Inventory::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryAdjustments::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryAdjustments::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryAdjustments::InventoryId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryAdjustments::UserId).uuid().null())
                        .col(
                            ColumnDef::new(InventoryAdjustments::ReferenceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::AdjustmentType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::QuantityBefore)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::QuantityChange)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::QuantityAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(money(InventoryAdjustments::UnitCost))
                        .col(money(InventoryAdjustments::TotalCostImpact))
                        .col(ColumnDef::new(InventoryAdjustments::Reason).string().null())
                        .col(ColumnDef::new(InventoryAdjustments::Notes).text().null())
                        .col(
                            ColumnDef::new(InventoryAdjustments::ReferenceType)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryAdjustments::ReferenceId).uuid().null())
                        .col(created_at(InventoryAdjustments::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_adjustments_inventory")
                                .from(InventoryAdjustments::Table, InventoryAdjustments::InventoryId)
                                .to(Inventory::Table, Inventory::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_adjustments_inventory")
                        .table(InventoryAdjustments::Table)
                        .col(InventoryAdjustments::InventoryId)
                        .col(InventoryAdjustments::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryAdjustments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Inventory {
        Table,
        Id,
        StoreId,
        ProductVariantId,
        WarehouseId,
        Quantity,
        ReservedQuantity,
        UnitCost,
        ReorderPoint,
        BinLocation,
        LastCountedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum InventoryAdjustments {
        Table,
        Id,
        StoreId,
        InventoryId,
        UserId,
        ReferenceNumber,
        AdjustmentType,
        QuantityBefore,
        QuantityChange,
        QuantityAfter,
        UnitCost,
        TotalCostImpact,
        Reason,
        Notes,
        ReferenceType,
        ReferenceId,
        CreatedAt,
    }
}

mod m20240101_000003_create_transaction_tables {
    use super::{created_at, money, version};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_transaction_tables"
        }
    }

    fn milestone(col: Transactions) -> ColumnDef {
        ColumnDef::new(col).timestamp_with_time_zone().null().to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transactions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Transactions::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Transactions::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(Transactions::TransactionNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::TransactionType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transactions::Source).string_len(16).not_null())
                        .col(ColumnDef::new(Transactions::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Transactions::CustomerName).string().null())
                        .col(ColumnDef::new(Transactions::CustomerEmail).string().null())
                        .col(ColumnDef::new(Transactions::CustomerPhone).string().null())
                        .col(
                            ColumnDef::new(Transactions::FinalOffer)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(Transactions::PaymentMethod).string().null())
                        .col(ColumnDef::new(Transactions::StatusReason).text().null())
                        .col(ColumnDef::new(Transactions::Notes).text().null())
                        .col(ColumnDef::new(Transactions::TrackingNumber).string().null())
                        .col(ColumnDef::new(Transactions::Carrier).string().null())
                        .col(
                            ColumnDef::new(Transactions::ReturnTrackingNumber)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Transactions::ReturnCarrier).string().null())
                        .col(milestone(Transactions::KitRequestConfirmedAt))
                        .col(milestone(Transactions::KitSentAt))
                        .col(milestone(Transactions::KitDeliveredAt))
                        .col(milestone(Transactions::ItemsReceivedAt))
                        .col(milestone(Transactions::ItemsReviewedAt))
                        .col(milestone(Transactions::OfferGivenAt))
                        .col(milestone(Transactions::OfferAcceptedAt))
                        .col(milestone(Transactions::PaymentProcessedAt))
                        .col(milestone(Transactions::ReturnRequestedAt))
                        .col(milestone(Transactions::ReturnShippedAt))
                        .col(milestone(Transactions::ItemsReturnedAt))
                        .col(milestone(Transactions::CancelledAt))
                        .col(ColumnDef::new(Transactions::CreatedBy).uuid().not_null())
                        .col(version(Transactions::Version))
                        .col(created_at(Transactions::CreatedAt))
                        .col(created_at(Transactions::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transactions_store_status")
                        .table(Transactions::Table)
                        .col(Transactions::StoreId)
                        .col(Transactions::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionItems::Title).string().not_null())
                        .col(ColumnDef::new(TransactionItems::CategoryId).uuid().null())
                        .col(ColumnDef::new(TransactionItems::MetalType).string().null())
                        .col(ColumnDef::new(TransactionItems::Karat).string().null())
                        .col(
                            ColumnDef::new(TransactionItems::WeightGrams)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(TransactionItems::Condition).string().null())
                        .col(
                            ColumnDef::new(TransactionItems::Price)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::BuyPrice)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(TransactionItems::Notes).text().null())
                        .col(
                            ColumnDef::new(TransactionItems::ReviewedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(TransactionItems::ReviewedBy).uuid().null())
                        .col(created_at(TransactionItems::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_items_transaction")
                                .from(TransactionItems::Table, TransactionItems::TransactionId)
                                .to(Transactions::Table, Transactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionOffers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionOffers::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransactionOffers::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(money(TransactionOffers::Amount))
                        .col(
                            ColumnDef::new(TransactionOffers::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionOffers::Notes).text().null())
                        .col(ColumnDef::new(TransactionOffers::DeclineReason).text().null())
                        .col(ColumnDef::new(TransactionOffers::OfferedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(TransactionOffers::RespondedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(created_at(TransactionOffers::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_offers_transaction")
                                .from(TransactionOffers::Table, TransactionOffers::TransactionId)
                                .to(Transactions::Table, Transactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionPayments::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransactionPayments::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionPayments::Method)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(money(TransactionPayments::Amount))
                        .col(ColumnDef::new(TransactionPayments::Reference).string().null())
                        .col(ColumnDef::new(TransactionPayments::PayoutId).string().null())
                        .col(
                            ColumnDef::new(TransactionPayments::ProcessedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(created_at(TransactionPayments::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_payments_transaction")
                                .from(
                                    TransactionPayments::Table,
                                    TransactionPayments::TransactionId,
                                )
                                .to(Transactions::Table, Transactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ActivityLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ActivityLogs::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(ActivityLogs::StoreId).uuid().not_null())
                        .col(ColumnDef::new(ActivityLogs::SubjectType).string().not_null())
                        .col(ColumnDef::new(ActivityLogs::SubjectId).uuid().not_null())
                        .col(ColumnDef::new(ActivityLogs::Action).string().not_null())
                        .col(ColumnDef::new(ActivityLogs::FromStatus).string().null())
                        .col(ColumnDef::new(ActivityLogs::ToStatus).string().null())
                        .col(ColumnDef::new(ActivityLogs::UserId).uuid().null())
                        .col(ColumnDef::new(ActivityLogs::Description).text().null())
                        .col(created_at(ActivityLogs::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_activity_logs_subject")
                        .table(ActivityLogs::Table)
                        .col(ActivityLogs::SubjectType)
                        .col(ActivityLogs::SubjectId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ActivityLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TransactionPayments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TransactionOffers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TransactionItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Transactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Transactions {
        Table,
        Id,
        StoreId,
        TransactionNumber,
        TransactionType,
        Source,
        Status,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        FinalOffer,
        PaymentMethod,
        StatusReason,
        Notes,
        TrackingNumber,
        Carrier,
        ReturnTrackingNumber,
        ReturnCarrier,
        KitRequestConfirmedAt,
        KitSentAt,
        KitDeliveredAt,
        ItemsReceivedAt,
        ItemsReviewedAt,
        OfferGivenAt,
        OfferAcceptedAt,
        PaymentProcessedAt,
        ReturnRequestedAt,
        ReturnShippedAt,
        ItemsReturnedAt,
        CancelledAt,
        CreatedBy,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TransactionItems {
        Table,
        Id,
        TransactionId,
        Title,
        CategoryId,
        MetalType,
        Karat,
        WeightGrams,
        Condition,
        Price,
        BuyPrice,
        Notes,
        ReviewedAt,
        ReviewedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum TransactionOffers {
        Table,
        Id,
        TransactionId,
        Amount,
        Status,
        Notes,
        DeclineReason,
        OfferedBy,
        RespondedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum TransactionPayments {
        Table,
        Id,
        TransactionId,
        Method,
        Amount,
        Reference,
        PayoutId,
        ProcessedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ActivityLogs {
        Table,
        Id,
        StoreId,
        SubjectType,
        SubjectId,
        Action,
        FromStatus,
        ToStatus,
        UserId,
        Description,
        CreatedAt,
    }
}

mod m20240101_000004_create_procurement_tables {
    use super::{created_at, money, version};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_procurement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::StoreId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::VendorId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::PoNumber).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::ExpectedDate).date().null())
                        .col(money(PurchaseOrders::Subtotal))
                        .col(money(PurchaseOrders::DiscountTotal))
                        .col(money(PurchaseOrders::TaxTotal))
                        .col(money(PurchaseOrders::Total))
                        .col(ColumnDef::new(PurchaseOrders::Notes).text().null())
                        .col(ColumnDef::new(PurchaseOrders::CancelReason).text().null())
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::ApprovedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::SubmittedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ClosedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(version(PurchaseOrders::Version))
                        .col(created_at(PurchaseOrders::CreatedAt))
                        .col(created_at(PurchaseOrders::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_store_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::StoreId)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::ProductVariantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::QuantityOrdered)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::QuantityReceived)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(money(PurchaseOrderItems::UnitCost))
                        .col(money(PurchaseOrderItems::DiscountPercent))
                        .col(money(PurchaseOrderItems::TaxRate))
                        .col(money(PurchaseOrderItems::LineTotal))
                        .col(created_at(PurchaseOrderItems::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_items_order")
                                .from(
                                    PurchaseOrderItems::Table,
                                    PurchaseOrderItems::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderReceipts::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrderReceipts::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderReceipts::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderReceipts::ReceiptNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderReceipts::ReceivedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderReceipts::Notes).text().null())
                        .col(created_at(PurchaseOrderReceipts::ReceivedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_receipts_order")
                                .from(
                                    PurchaseOrderReceipts::Table,
                                    PurchaseOrderReceipts::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderReceiptItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderReceiptItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderReceiptItems::ReceiptId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderReceiptItems::PurchaseOrderItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderReceiptItems::InventoryAdjustmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderReceiptItems::QuantityReceived)
                                .integer()
                                .not_null(),
                        )
                        .col(money(PurchaseOrderReceiptItems::UnitCost))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_receipt_items_receipt")
                                .from(
                                    PurchaseOrderReceiptItems::Table,
                                    PurchaseOrderReceiptItems::ReceiptId,
                                )
                                .to(PurchaseOrderReceipts::Table, PurchaseOrderReceipts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderReceiptItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrderReceipts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        StoreId,
        VendorId,
        WarehouseId,
        PoNumber,
        Status,
        ExpectedDate,
        Subtotal,
        DiscountTotal,
        TaxTotal,
        Total,
        Notes,
        CancelReason,
        CreatedBy,
        ApprovedBy,
        SubmittedAt,
        ApprovedAt,
        CancelledAt,
        ClosedAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderItems {
        Table,
        Id,
        PurchaseOrderId,
        ProductVariantId,
        QuantityOrdered,
        QuantityReceived,
        UnitCost,
        DiscountPercent,
        TaxRate,
        LineTotal,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderReceipts {
        Table,
        Id,
        StoreId,
        PurchaseOrderId,
        ReceiptNumber,
        ReceivedBy,
        Notes,
        ReceivedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderReceiptItems {
        Table,
        Id,
        ReceiptId,
        PurchaseOrderItemId,
        InventoryAdjustmentId,
        QuantityReceived,
        UnitCost,
    }
}

mod m20240101_000005_create_category_tables {
    use super::created_at;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_category_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Categories::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Categories::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Categories::ParentId).uuid().null())
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(
                            ColumnDef::new(Categories::Level)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Categories::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Categories::SkuFormat).string_len(100).null())
                        .col(ColumnDef::new(Categories::SkuPrefix).string().null())
                        .col(ColumnDef::new(Categories::TitleFormat).string().null())
                        .col(ColumnDef::new(Categories::DefaultTemplateId).uuid().null())
                        .col(ColumnDef::new(Categories::LabelTemplateId).uuid().null())
                        .col(ColumnDef::new(Categories::ChargeTaxes).boolean().null())
                        .col(ColumnDef::new(Categories::BarcodeAttributes).text().null())
                        .col(created_at(Categories::CreatedAt))
                        .col(created_at(Categories::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_store_parent")
                        .table(Categories::Table)
                        .col(Categories::StoreId)
                        .col(Categories::ParentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SkuSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SkuSequences::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SkuSequences::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(SkuSequences::CategoryId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(SkuSequences::NextValue)
                                .big_integer()
                                .not_null()
                                .default(1),
                        )
                        .col(created_at(SkuSequences::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sku_sequences_category")
                                .from(SkuSequences::Table, SkuSequences::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SkuSequences::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        StoreId,
        ParentId,
        Name,
        Level,
        SortOrder,
        SkuFormat,
        SkuPrefix,
        TitleFormat,
        DefaultTemplateId,
        LabelTemplateId,
        ChargeTaxes,
        BarcodeAttributes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SkuSequences {
        Table,
        Id,
        StoreId,
        CategoryId,
        NextValue,
        UpdatedAt,
    }
}

mod m20240101_000006_create_platform_listings_table {
    use super::{created_at, version};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_platform_listings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PlatformListings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PlatformListings::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PlatformListings::StoreId).uuid().not_null())
                        .col(ColumnDef::new(PlatformListings::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(PlatformListings::Platform)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PlatformListings::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PlatformListings::ShouldList)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PlatformListings::PriceOverride)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PlatformListings::QuantityOverride)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(PlatformListings::ExternalId).string().null())
                        .col(ColumnDef::new(PlatformListings::ExternalUrl).string().null())
                        .col(
                            ColumnDef::new(PlatformListings::LastSyncedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PlatformListings::LastError).text().null())
                        .col(
                            ColumnDef::new(PlatformListings::PublishedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PlatformListings::EndedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(version(PlatformListings::Version))
                        .col(created_at(PlatformListings::CreatedAt))
                        .col(created_at(PlatformListings::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_platform_listings_product_platform")
                        .table(PlatformListings::Table)
                        .col(PlatformListings::ProductId)
                        .col(PlatformListings::Platform)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PlatformListings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PlatformListings {
        Table,
        Id,
        StoreId,
        ProductId,
        Platform,
        Status,
        ShouldList,
        PriceOverride,
        QuantityOverride,
        ExternalId,
        ExternalUrl,
        LastSyncedAt,
        LastError,
        PublishedAt,
        EndedAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn migration_names_are_unique() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().all(|name| name.starts_with("m2024")));
    }

    #[tokio::test]
    async fn applies_every_migration_on_sqlite() {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .expect("sqlite connection");
        Migrator::up(&db, None).await.expect("migrate up");

        let applied = Migrator::get_applied_migrations(&db).await.expect("applied");
        assert_eq!(applied.len(), Migrator::migrations().len());
        assert!(Migrator::get_pending_migrations(&db)
            .await
            .expect("pending")
            .is_empty());

        // A second run finds nothing to do.
        Migrator::up(&db, None).await.expect("migrate up again");
    }
}
