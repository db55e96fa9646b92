use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_purchasing_tables::Migration),
            Box::new(m20240601_000002_create_console_tables::Migration),
            Box::new(m20240601_000003_create_consignment_tables::Migration),
            Box::new(m20240601_000004_create_packaging_tables::Migration),
            Box::new(m20240601_000005_create_audit_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240601_000001_create_purchasing_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_purchasing_tables"
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
                        .col(ColumnDef::new(PurchaseOrders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::PoNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SupplierName).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::PurchaseOrderId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::LineNumber).integer().not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::ProductCode).string().not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::Description).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::OrderedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::AllocatedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::RemainingQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::UnitWeightKg).decimal().null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::IsChemical)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::IsDangerousGood)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_purchase_order_id")
                                .from(PurchaseOrderLines::Table, PurchaseOrderLines::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum PurchaseOrders {
        Table,
        Id,
        PoNumber,
        SupplierName,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum PurchaseOrderLines {
        Table,
        Id,
        PurchaseOrderId,
        LineNumber,
        ProductCode,
        Description,
        OrderedQuantity,
        AllocatedQuantity,
        RemainingQuantity,
        UnitWeightKg,
        IsChemical,
        IsDangerousGood,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_console_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_console_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FreightForwarders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FreightForwarders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FreightForwarders::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(FreightForwarders::Name).string().not_null())
                        .col(ColumnDef::new(FreightForwarders::ContactEmail).string().null())
                        .col(
                            ColumnDef::new(FreightForwarders::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Consoles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Consoles::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Consoles::ConsoleId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Consoles::Status).string().not_null())
                        .col(ColumnDef::new(Consoles::FreightForwarderId).uuid().null())
                        .col(
                            ColumnDef::new(Consoles::PickupDatetime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Consoles::GlAccount).string().null())
                        .col(ColumnDef::new(Consoles::DestinationKey).string().not_null())
                        .col(ColumnDef::new(Consoles::DestinationCountry).string().null())
                        .col(ColumnDef::new(Consoles::PickupRejectionReason).text().null())
                        .col(
                            ColumnDef::new(Consoles::LastBolGeneratedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Consoles::LastBolGeneratedBy).uuid().null())
                        .col(ColumnDef::new(Consoles::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Consoles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Consoles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consoles_freight_forwarder_id")
                                .from(Consoles::Table, Consoles::FreightForwarderId)
                                .to(FreightForwarders::Table, FreightForwarders::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Consoles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(FreightForwarders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum FreightForwarders {
        Table,
        Id,
        Code,
        Name,
        ContactEmail,
        Active,
    }

    #[derive(DeriveIden)]
    pub enum Consoles {
        Table,
        Id,
        ConsoleId,
        Status,
        FreightForwarderId,
        PickupDatetime,
        GlAccount,
        DestinationKey,
        DestinationCountry,
        PickupRejectionReason,
        LastBolGeneratedAt,
        LastBolGeneratedBy,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_consignment_tables {

    use super::m20240601_000001_create_purchasing_tables::PurchaseOrderLines;
    use super::m20240601_000002_create_console_tables::{Consoles, FreightForwarders};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_consignment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Consignments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Consignments::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Consignments::ConsignmentId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Consignments::Status)
                                .string()
                                .not_null()
                                .default("DRAFT"),
                        )
                        .col(
                            ColumnDef::new(Consignments::Step)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Consignments::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(Consignments::ConsignorName).string().null())
                        .col(ColumnDef::new(Consignments::ConsignorAddress).string().null())
                        .col(ColumnDef::new(Consignments::ConsignorCity).string().null())
                        .col(ColumnDef::new(Consignments::ConsignorPostalCode).string().null())
                        .col(ColumnDef::new(Consignments::ConsignorCountry).string().null())
                        .col(ColumnDef::new(Consignments::DeliveryName).string().null())
                        .col(ColumnDef::new(Consignments::DeliveryAddress).string().null())
                        .col(ColumnDef::new(Consignments::DeliveryCity).string().null())
                        .col(ColumnDef::new(Consignments::DeliveryPostalCode).string().null())
                        .col(ColumnDef::new(Consignments::DeliveryCountry).string().null())
                        .col(ColumnDef::new(Consignments::ConsoleId).uuid().null())
                        .col(ColumnDef::new(Consignments::FreightForwarderId).uuid().null())
                        .col(
                            ColumnDef::new(Consignments::PickupDatetime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Consignments::GlCode).string().null())
                        .col(
                            ColumnDef::new(Consignments::BolGeneratedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Consignments::XmlId).string().null().unique_key())
                        .col(
                            ColumnDef::new(Consignments::XmlGeneratedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Consignments::RejectionReason).text().null())
                        .col(
                            ColumnDef::new(Consignments::SubmittedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Consignments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Consignments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignments_console_id")
                                .from(Consignments::Table, Consignments::ConsoleId)
                                .to(Consoles::Table, Consoles::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignments_freight_forwarder_id")
                                .from(Consignments::Table, Consignments::FreightForwarderId)
                                .to(FreightForwarders::Table, FreightForwarders::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_consignments_status")
                        .table(Consignments::Table)
                        .col(Consignments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ConsignmentPoLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsignmentPoLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsignmentPoLines::ConsignmentId).uuid().not_null())
                        .col(ColumnDef::new(ConsignmentPoLines::PoLineId).uuid().not_null())
                        .col(ColumnDef::new(ConsignmentPoLines::HsCode).string().null())
                        .col(ColumnDef::new(ConsignmentPoLines::Eccn).string().null())
                        .col(ColumnDef::new(ConsignmentPoLines::DgClass).string().null())
                        .col(ColumnDef::new(ConsignmentPoLines::UnNumber).string().null())
                        .col(ColumnDef::new(ConsignmentPoLines::DgCategory).string().null())
                        .col(ColumnDef::new(ConsignmentPoLines::CountryOfOrigin).string().null())
                        .col(
                            ColumnDef::new(ConsignmentPoLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentPoLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignment_po_lines_consignment_id")
                                .from(ConsignmentPoLines::Table, ConsignmentPoLines::ConsignmentId)
                                .to(Consignments::Table, Consignments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignment_po_lines_po_line_id")
                                .from(ConsignmentPoLines::Table, ConsignmentPoLines::PoLineId)
                                .to(PurchaseOrderLines::Table, PurchaseOrderLines::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_consignment_po_lines_consignment_line")
                        .table(ConsignmentPoLines::Table)
                        .col(ConsignmentPoLines::ConsignmentId)
                        .col(ConsignmentPoLines::PoLineId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ConsignmentDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsignmentDocuments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentDocuments::ConsignmentPoLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsignmentDocuments::DocumentType).string().not_null())
                        .col(ColumnDef::new(ConsignmentDocuments::FileName).string().not_null())
                        .col(ColumnDef::new(ConsignmentDocuments::FileUrl).string().not_null())
                        .col(ColumnDef::new(ConsignmentDocuments::UploadedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(ConsignmentDocuments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignment_documents_line_id")
                                .from(
                                    ConsignmentDocuments::Table,
                                    ConsignmentDocuments::ConsignmentPoLineId,
                                )
                                .to(ConsignmentPoLines::Table, ConsignmentPoLines::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConsignmentDocuments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ConsignmentPoLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Consignments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Consignments {
        Table,
        Id,
        ConsignmentId,
        Status,
        Step,
        CreatedBy,
        ConsignorName,
        ConsignorAddress,
        ConsignorCity,
        ConsignorPostalCode,
        ConsignorCountry,
        DeliveryName,
        DeliveryAddress,
        DeliveryCity,
        DeliveryPostalCode,
        DeliveryCountry,
        ConsoleId,
        FreightForwarderId,
        PickupDatetime,
        GlCode,
        BolGeneratedAt,
        XmlId,
        XmlGeneratedAt,
        RejectionReason,
        SubmittedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum ConsignmentPoLines {
        Table,
        Id,
        ConsignmentId,
        PoLineId,
        HsCode,
        Eccn,
        DgClass,
        UnNumber,
        DgCategory,
        CountryOfOrigin,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ConsignmentDocuments {
        Table,
        Id,
        ConsignmentPoLineId,
        DocumentType,
        FileName,
        FileUrl,
        UploadedBy,
        CreatedAt,
    }
}

mod m20240601_000004_create_packaging_tables {

    use super::m20240601_000001_create_purchasing_tables::PurchaseOrderLines;
    use super::m20240601_000003_create_consignment_tables::Consignments;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_packaging_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PackagingTypes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(PackagingTypes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(PackagingTypes::Name).string().not_null())
                        .col(ColumnDef::new(PackagingTypes::LengthCm).decimal().not_null())
                        .col(ColumnDef::new(PackagingTypes::WidthCm).decimal().not_null())
                        .col(ColumnDef::new(PackagingTypes::HeightCm).decimal().not_null())
                        .col(ColumnDef::new(PackagingTypes::TareWeightKg).decimal().not_null())
                        .col(ColumnDef::new(PackagingTypes::MaxWeightKg).decimal().not_null())
                        .col(
                            ColumnDef::new(PackagingTypes::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ConsignmentPackagings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsignmentPackagings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentPackagings::ConsignmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentPackagings::PackagingTypeId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentPackagings::PackageId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ConsignmentPackagings::DraftPackageId).string().null())
                        .col(ColumnDef::new(ConsignmentPackagings::GrossWeightKg).decimal().null())
                        .col(
                            ColumnDef::new(ConsignmentPackagings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentPackagings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignment_packagings_consignment_id")
                                .from(
                                    ConsignmentPackagings::Table,
                                    ConsignmentPackagings::ConsignmentId,
                                )
                                .to(Consignments::Table, Consignments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consignment_packagings_type_id")
                                .from(
                                    ConsignmentPackagings::Table,
                                    ConsignmentPackagings::PackagingTypeId,
                                )
                                .to(PackagingTypes::Table, PackagingTypes::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PackagingAllocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PackagingAllocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingAllocations::ConsignmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PackagingAllocations::PoLineId).uuid().not_null())
                        .col(ColumnDef::new(PackagingAllocations::PackagingId).uuid().not_null())
                        .col(
                            ColumnDef::new(PackagingAllocations::AllocatedQty)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingAllocations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingAllocations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_packaging_allocations_consignment_id")
                                .from(
                                    PackagingAllocations::Table,
                                    PackagingAllocations::ConsignmentId,
                                )
                                .to(Consignments::Table, Consignments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_packaging_allocations_po_line_id")
                                .from(PackagingAllocations::Table, PackagingAllocations::PoLineId)
                                .to(PurchaseOrderLines::Table, PurchaseOrderLines::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_packaging_allocations_packaging_id")
                                .from(
                                    PackagingAllocations::Table,
                                    PackagingAllocations::PackagingId,
                                )
                                .to(ConsignmentPackagings::Table, ConsignmentPackagings::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_packaging_allocations_line_package")
                        .table(PackagingAllocations::Table)
                        .col(PackagingAllocations::PoLineId)
                        .col(PackagingAllocations::PackagingId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PackagingAllocations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ConsignmentPackagings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PackagingTypes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PackagingTypes {
        Table,
        Id,
        Name,
        LengthCm,
        WidthCm,
        HeightCm,
        TareWeightKg,
        MaxWeightKg,
        Active,
    }

    #[derive(DeriveIden)]
    enum ConsignmentPackagings {
        Table,
        Id,
        ConsignmentId,
        PackagingTypeId,
        PackageId,
        DraftPackageId,
        GrossWeightKg,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PackagingAllocations {
        Table,
        Id,
        ConsignmentId,
        PoLineId,
        PackagingId,
        AllocatedQty,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000005_create_audit_tables {

    use super::m20240601_000002_create_console_tables::Consoles;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_audit_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ConsoleAuditTrails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsoleAuditTrails::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsoleAuditTrails::ConsoleId).uuid().not_null())
                        .col(ColumnDef::new(ConsoleAuditTrails::Action).string().not_null())
                        .col(ColumnDef::new(ConsoleAuditTrails::ActorId).uuid().not_null())
                        .col(
                            ColumnDef::new(ConsoleAuditTrails::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_console_audit_trails_console_id")
                                .from(ConsoleAuditTrails::Table, ConsoleAuditTrails::ConsoleId)
                                .to(Consoles::Table, Consoles::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ConsoleAuditTrailFields::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsoleAuditTrailFields::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsoleAuditTrailFields::AuditTrailId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsoleAuditTrailFields::FieldName).string().not_null())
                        .col(ColumnDef::new(ConsoleAuditTrailFields::OldValue).text().null())
                        .col(ColumnDef::new(ConsoleAuditTrailFields::NewValue).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_console_audit_trail_fields_trail_id")
                                .from(
                                    ConsoleAuditTrailFields::Table,
                                    ConsoleAuditTrailFields::AuditTrailId,
                                )
                                .to(ConsoleAuditTrails::Table, ConsoleAuditTrails::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLogs::EntityType).string().not_null())
                        .col(ColumnDef::new(AuditLogs::EntityId).uuid().not_null())
                        .col(ColumnDef::new(AuditLogs::FieldName).string().not_null())
                        .col(ColumnDef::new(AuditLogs::OldValue).text().null())
                        .col(ColumnDef::new(AuditLogs::NewValue).text().null())
                        .col(ColumnDef::new(AuditLogs::ActorId).uuid().not_null())
                        .col(
                            ColumnDef::new(AuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_audit_logs_entity")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::EntityType)
                        .col(AuditLogs::EntityId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ConsoleAuditTrailFields::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ConsoleAuditTrails::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ConsoleAuditTrails {
        Table,
        Id,
        ConsoleId,
        Action,
        ActorId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ConsoleAuditTrailFields {
        Table,
        Id,
        AuditTrailId,
        FieldName,
        OldValue,
        NewValue,
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        EntityType,
        EntityId,
        FieldName,
        OldValue,
        NewValue,
        ActorId,
        CreatedAt,
    }
}
