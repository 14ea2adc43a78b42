use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EncryptionKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EncryptionKeys::Version)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EncryptionKeys::KeyMaterial)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EncryptionKeys::IsCurrent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(EncryptionKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EncryptionKeys::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EncryptionKeys {
    Table,
    Version,
    KeyMaterial,
    IsCurrent,
    CreatedAt,
}
