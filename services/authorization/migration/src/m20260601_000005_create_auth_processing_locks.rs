use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthProcessingLocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthProcessingLocks::AuthRequestId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthProcessingLocks::WorkerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthProcessingLocks::AcquiredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthProcessingLocks::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The cleanup sweep scans by expiry.
        manager
            .create_index(
                Index::create()
                    .table(AuthProcessingLocks::Table)
                    .col(AuthProcessingLocks::ExpiresAt)
                    .name("idx_auth_processing_locks_expires_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthProcessingLocks::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuthProcessingLocks {
    Table,
    AuthRequestId,
    WorkerId,
    AcquiredAt,
    ExpiresAt,
}
