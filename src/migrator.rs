use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_bom_tables::Migration),
            Box::new(m20240101_000003_create_production_tables::Migration),
            Box::new(m20240101_000004_create_app_settings_table::Migration),
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
                        .table(ProductModels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductModels::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductModels::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ProductModels::Description).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::ProductModelId).uuid().not_null())
                        .col(ColumnDef::new(Products::Description).string().null())
                        .col(ColumnDef::new(Products::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            // Product names may repeat across models only.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_products_name_model")
                        .table(Products::Table)
                        .col(Products::Name)
                        .col(Products::ProductModelId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parts::Name).string().not_null())
                        .col(ColumnDef::new(Parts::ProductModelId).uuid().not_null())
                        .col(
                            ColumnDef::new(Parts::StockCut)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Parts::StockCncTools)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Parts::Threshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Parts::Description).string().null())
                        .col(ColumnDef::new(Parts::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Parts::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_parts_name_model")
                        .table(Parts::Table)
                        .col(Parts::Name)
                        .col(Parts::ProductModelId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Materials::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Materials::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        // Precision capped at 16: the sqlite query builder
                        // rejects anything larger.
                        .col(
                            ColumnDef::new(Materials::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Materials::Unit).string().null())
                        .col(
                            ColumnDef::new(Materials::Threshold)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Materials::Price).decimal_len(12, 2).null())
                        .col(ColumnDef::new(Materials::Supplier).string().null())
                        .col(ColumnDef::new(Materials::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Materials::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Parts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductModels::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(Iden)]
    pub(super) enum ProductModels {
        Table,
        Id,
        Name,
        Description,
    }

    #[derive(Iden)]
    pub(super) enum Products {
        Table,
        Id,
        Name,
        ProductModelId,
        Description,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub(super) enum Parts {
        Table,
        Id,
        Name,
        ProductModelId,
        StockCut,
        StockCncTools,
        Threshold,
        Description,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub(super) enum Materials {
        Table,
        Id,
        Name,
        Quantity,
        Unit,
        Threshold,
        Price,
        Supplier,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_bom_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_bom_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductComponents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductComponents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductComponents::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductComponents::PartId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductComponents::Qty)
                                .integer()
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
                        .name("uq_product_components_product_part")
                        .table(ProductComponents::Table)
                        .col(ProductComponents::ProductId)
                        .col(ProductComponents::PartId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductMaterials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterials::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterials::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterials::Qty)
                                .decimal_len(12, 3)
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
                        .name("uq_product_materials_product_material")
                        .table(ProductMaterials::Table)
                        .col(ProductMaterials::ProductId)
                        .col(ProductMaterials::MaterialId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductMaterials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductComponents::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(Iden)]
    pub(super) enum ProductComponents {
        Table,
        Id,
        ProductId,
        PartId,
        Qty,
    }

    #[derive(Iden)]
    pub(super) enum ProductMaterials {
        Table,
        Id,
        ProductId,
        MaterialId,
        Qty,
    }
}

mod m20240101_000003_create_production_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_production_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductStocks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductStocks::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::ProductId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockWorkpage)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockUndercoating)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockPainting)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockSewing)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockUpholstery)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockAssembly)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::StockPackaging)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStocks::Threshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ProductStocks::Description).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionJobs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionJobs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionJobs::JobNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ProductionJobs::ProductId).uuid().null())
                        .col(ColumnDef::new(ProductionJobs::PartId).uuid().null())
                        .col(
                            ColumnDef::new(ProductionJobs::CurrentSection)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(ProductionJobs::Status).string().not_null())
                        .col(ColumnDef::new(ProductionJobs::JobLabel).string().not_null())
                        .col(
                            ColumnDef::new(ProductionJobs::DepositAccount)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionJobs::IsExternalEntry)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ProductionJobs::AllowedSections)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionJobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionJobs::FinishedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_jobs_status")
                        .table(ProductionJobs::Table)
                        .col(ProductionJobs::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionLogs::JobId).uuid().null())
                        .col(ColumnDef::new(ProductionLogs::ProductId).uuid().null())
                        .col(ColumnDef::new(ProductionLogs::PartId).uuid().null())
                        .col(ColumnDef::new(ProductionLogs::Section).string().not_null())
                        .col(
                            ColumnDef::new(ProductionLogs::ProducedQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductionLogs::ScrapQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductionLogs::IsScrap)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ProductionLogs::IsExternal)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ProductionLogs::Actor).string().not_null())
                        .col(ColumnDef::new(ProductionLogs::Role).string().not_null())
                        .col(ColumnDef::new(ProductionLogs::ModelName).string().not_null())
                        .col(ColumnDef::new(ProductionLogs::Note).string().null())
                        .col(
                            ColumnDef::new(ProductionLogs::LoggedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One log per (job, section). NULL job_id rows (job-less part
            // logs) are exempt: SQL unique indexes treat NULLs as distinct.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_production_logs_job_section")
                        .table(ProductionLogs::Table)
                        .col(ProductionLogs::JobId)
                        .col(ProductionLogs::Section)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_logs_logged_at")
                        .table(ProductionLogs::Table)
                        .col(ProductionLogs::LoggedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionJobs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductStocks::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(Iden)]
    pub(super) enum ProductStocks {
        Table,
        Id,
        ProductId,
        StockWorkpage,
        StockUndercoating,
        StockPainting,
        StockSewing,
        StockUpholstery,
        StockAssembly,
        StockPackaging,
        Threshold,
        Description,
    }

    #[derive(Iden)]
    pub(super) enum ProductionJobs {
        Table,
        Id,
        JobNumber,
        ProductId,
        PartId,
        CurrentSection,
        Status,
        JobLabel,
        DepositAccount,
        IsExternalEntry,
        AllowedSections,
        CreatedAt,
        FinishedAt,
    }

    #[derive(Iden)]
    pub(super) enum ProductionLogs {
        Table,
        Id,
        JobId,
        ProductId,
        PartId,
        Section,
        ProducedQty,
        ScrapQty,
        IsScrap,
        IsExternal,
        Actor,
        Role,
        ModelName,
        Note,
        LoggedAt,
    }
}

mod m20240101_000004_create_app_settings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_app_settings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AppSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AppSettings::Key)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AppSettings::Value).string().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AppSettings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub(super) enum AppSettings {
        Table,
        Key,
        Value,
    }
}
