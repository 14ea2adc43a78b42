use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RestaurantPaymentConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RestaurantPaymentConfigs::RestaurantId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RestaurantPaymentConfigs::ProcessorConfig)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantPaymentConfigs::ConfigVersion)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RestaurantPaymentConfigs::StatementDescriptor).string())
                    .col(ColumnDef::new(RestaurantPaymentConfigs::Metadata).json_binary())
                    .col(
                        ColumnDef::new(RestaurantPaymentConfigs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RestaurantPaymentConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(RestaurantPaymentConfigs::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum RestaurantPaymentConfigs {
    Table,
    RestaurantId,
    ProcessorConfig,
    ConfigVersion,
    StatementDescriptor,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
