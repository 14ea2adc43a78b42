use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthRequestState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthRequestState::AuthRequestId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthRequestState::RestaurantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthRequestState::PaymentToken)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthRequestState::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthRequestState::Currency)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthRequestState::Status).string().not_null())
                    .col(
                        ColumnDef::new(AuthRequestState::LatestSequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthRequestState::ProcessorName).string())
                    .col(ColumnDef::new(AuthRequestState::ProcessorAuthId).string())
                    .col(ColumnDef::new(AuthRequestState::AuthorizationCode).string())
                    .col(ColumnDef::new(AuthRequestState::AuthorizedAmountMinor).big_integer())
                    .col(ColumnDef::new(AuthRequestState::DenialCode).string())
                    .col(ColumnDef::new(AuthRequestState::DenialReason).string())
                    .col(ColumnDef::new(AuthRequestState::ErrorMessage).string())
                    .col(
                        ColumnDef::new(AuthRequestState::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AuthRequestState::Metadata).json_binary())
                    .col(
                        ColumnDef::new(AuthRequestState::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthRequestState::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Status lookups are tenant-scoped.
        manager
            .create_index(
                Index::create()
                    .table(AuthRequestState::Table)
                    .col(AuthRequestState::RestaurantId)
                    .name("idx_auth_request_state_restaurant_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthRequestState::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuthRequestState {
    Table,
    AuthRequestId,
    RestaurantId,
    PaymentToken,
    AmountMinor,
    Currency,
    Status,
    LatestSequence,
    ProcessorName,
    ProcessorAuthId,
    AuthorizationCode,
    AuthorizedAmountMinor,
    DenialCode,
    DenialReason,
    ErrorMessage,
    RetryCount,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
