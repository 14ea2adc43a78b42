use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TokenIdempotencyKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TokenIdempotencyKeys::RestaurantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TokenIdempotencyKeys::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TokenIdempotencyKeys::TokenId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TokenIdempotencyKeys::Fingerprint)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TokenIdempotencyKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TokenIdempotencyKeys::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(TokenIdempotencyKeys::RestaurantId)
                            .col(TokenIdempotencyKeys::IdempotencyKey),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TokenIdempotencyKeys::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TokenIdempotencyKeys {
    Table,
    RestaurantId,
    IdempotencyKey,
    TokenId,
    Fingerprint,
    CreatedAt,
    ExpiresAt,
}
