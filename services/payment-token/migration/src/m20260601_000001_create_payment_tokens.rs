use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentTokens::TokenId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentTokens::RestaurantId).uuid().not_null())
                    .col(
                        ColumnDef::new(PaymentTokens::Ciphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTokens::Nonce)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTokens::ServiceKeyVersion)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTokens::OriginKeyId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentTokens::CardBrand).string().not_null())
                    .col(ColumnDef::new(PaymentTokens::Last4).string_len(4).not_null())
                    .col(ColumnDef::new(PaymentTokens::ExpMonth).integer().not_null())
                    .col(ColumnDef::new(PaymentTokens::ExpYear).integer().not_null())
                    .col(
                        ColumnDef::new(PaymentTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(PaymentTokens::Table)
                    .col(PaymentTokens::RestaurantId)
                    .name("idx_payment_tokens_restaurant_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentTokens::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PaymentTokens {
    Table,
    TokenId,
    RestaurantId,
    Ciphertext,
    Nonce,
    ServiceKeyVersion,
    OriginKeyId,
    CardBrand,
    Last4,
    ExpMonth,
    ExpYear,
    CreatedAt,
    ExpiresAt,
}
