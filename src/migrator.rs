use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_categories_table::Migration),
            Box::new(m20240301_000002_create_descriptions_table::Migration),
            Box::new(m20240301_000003_create_harvests_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_categories_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_categories_table"
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
                        .col(
                            ColumnDef::new(Categories::Id)
                                .string_len(24)
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Categories::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Categories::NameKey).string().not_null())
                        .col(ColumnDef::new(Categories::Description).string_len(500).null())
                        .col(
                            ColumnDef::new(Categories::Status)
                                .string_len(20)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Categories::Order)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Categories::Metadata).json().not_null())
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_name_key")
                        .table(Categories::Table)
                        .col(Categories::NameKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_status")
                        .table(Categories::Table)
                        .col(Categories::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Categories {
        Table,
        Id,
        Name,
        NameKey,
        Description,
        Status,
        Order,
        Metadata,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_descriptions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_descriptions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Descriptions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Descriptions::Id)
                                .string_len(24)
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Descriptions::Description)
                                .string_len(1000)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Descriptions::DescriptionKey).text().not_null())
                        .col(
                            ColumnDef::new(Descriptions::CategoryId)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Descriptions::ParentId).string_len(24).null())
                        .col(ColumnDef::new(Descriptions::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(Descriptions::Status)
                                .string_len(20)
                                .not_null()
                                .default("active"),
                        )
                        .col(ColumnDef::new(Descriptions::Metadata).json().not_null())
                        .col(
                            ColumnDef::new(Descriptions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Descriptions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_descriptions_category")
                                .from(Descriptions::Table, Descriptions::CategoryId)
                                .to(Categories::Table, Categories::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_descriptions_parent")
                                .from(Descriptions::Table, Descriptions::ParentId)
                                .to(Descriptions::Table, Descriptions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_descriptions_category_key")
                        .table(Descriptions::Table)
                        .col(Descriptions::CategoryId)
                        .col(Descriptions::DescriptionKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_descriptions_category_status")
                        .table(Descriptions::Table)
                        .col(Descriptions::CategoryId)
                        .col(Descriptions::Status)
                        .to_owned(),
                )
                .await?;

            // Children lookups during status propagation
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_descriptions_parent_status")
                        .table(Descriptions::Table)
                        .col(Descriptions::ParentId)
                        .col(Descriptions::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Descriptions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Descriptions {
        Table,
        Id,
        Description,
        DescriptionKey,
        CategoryId,
        ParentId,
        CreatedBy,
        Status,
        Metadata,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum Categories {
        Table,
        Id,
    }
}

mod m20240301_000003_create_harvests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_harvests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Harvests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Harvests::Id)
                                .string_len(24)
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Harvests::DescriptionId)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Harvests::Amount)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Harvests::Unit).string_len(10).not_null())
                        .col(
                            ColumnDef::new(Harvests::HarvestDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Harvests::Status)
                                .string_len(20)
                                .not_null()
                                .default("active"),
                        )
                        .col(ColumnDef::new(Harvests::Metadata).json().not_null())
                        .col(
                            ColumnDef::new(Harvests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Harvests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_harvests_description")
                                .from(Harvests::Table, Harvests::DescriptionId)
                                .to(Descriptions::Table, Descriptions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_harvests_harvest_date")
                        .table(Harvests::Table)
                        .col(Harvests::HarvestDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_harvests_status")
                        .table(Harvests::Table)
                        .col(Harvests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_harvests_description_id")
                        .table(Harvests::Table)
                        .col(Harvests::DescriptionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Harvests::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Harvests {
        Table,
        Id,
        DescriptionId,
        Amount,
        Unit,
        HarvestDate,
        Status,
        Metadata,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum Descriptions {
        Table,
        Id,
    }
}
