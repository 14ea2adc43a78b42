use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthIdempotencyKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::RestaurantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::Operation)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::AuthRequestId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::Fingerprint)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthIdempotencyKeys::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Authorize and void bindings live in separate key
                    // spaces; the operation column is part of the identity.
                    .primary_key(
                        Index::create()
                            .col(AuthIdempotencyKeys::RestaurantId)
                            .col(AuthIdempotencyKeys::IdempotencyKey)
                            .col(AuthIdempotencyKeys::Operation),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthIdempotencyKeys::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuthIdempotencyKeys {
    Table,
    RestaurantId,
    IdempotencyKey,
    Operation,
    AuthRequestId,
    Fingerprint,
    CreatedAt,
    ExpiresAt,
}
