use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DecryptAuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DecryptAuditLog::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DecryptAuditLog::TokenId).string().not_null())
                    .col(
                        ColumnDef::new(DecryptAuditLog::RestaurantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DecryptAuditLog::RequestingService)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DecryptAuditLog::Result).string().not_null())
                    .col(ColumnDef::new(DecryptAuditLog::CorrelationId).string())
                    .col(
                        ColumnDef::new(DecryptAuditLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(DecryptAuditLog::Table)
                    .col(DecryptAuditLog::TokenId)
                    .name("idx_decrypt_audit_log_token_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DecryptAuditLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DecryptAuditLog {
    Table,
    Id,
    TokenId,
    RestaurantId,
    RequestingService,
    Result,
    CorrelationId,
    CreatedAt,
}
