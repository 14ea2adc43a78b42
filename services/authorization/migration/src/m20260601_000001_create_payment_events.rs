use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentEvents::EventId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentEvents::AggregateId).uuid().not_null())
                    .col(
                        ColumnDef::new(PaymentEvents::AggregateType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentEvents::EventType).string().not_null())
                    .col(
                        ColumnDef::new(PaymentEvents::Payload)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentEvents::SequenceNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentEvents::Metadata).json_binary())
                    .col(
                        ColumnDef::new(PaymentEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The per-aggregate sequence compare-and-set: two writers racing on
        // the same sequence number collide here and one retries.
        manager
            .create_index(
                Index::create()
                    .table(PaymentEvents::Table)
                    .col(PaymentEvents::AggregateId)
                    .col(PaymentEvents::SequenceNumber)
                    .unique()
                    .name("uq_payment_events_aggregate_sequence")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PaymentEvents {
    Table,
    EventId,
    AggregateId,
    AggregateType,
    EventType,
    Payload,
    SequenceNumber,
    Metadata,
    CreatedAt,
}
