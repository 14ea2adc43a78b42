use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboxMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboxMessages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OutboxMessages::Destination)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboxMessages::MessageGroup).string())
                    .col(
                        ColumnDef::new(OutboxMessages::Payload)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboxMessages::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(OutboxMessages::LastError).string())
                    .col(
                        ColumnDef::new(OutboxMessages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboxMessages::NextAttemptAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboxMessages::ProcessedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index for relay poll queries (unprocessed, by next_attempt_at).
        manager
            .create_index(
                Index::create()
                    .table(OutboxMessages::Table)
                    .col(OutboxMessages::NextAttemptAt)
                    .name("idx_outbox_messages_next_attempt_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboxMessages::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OutboxMessages {
    Table,
    Id,
    Destination,
    MessageGroup,
    Payload,
    Attempts,
    LastError,
    CreatedAt,
    NextAttemptAt,
    ProcessedAt,
}
