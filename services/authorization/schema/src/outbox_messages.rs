use sea_orm::entity::prelude::*;

/// Transactional outbox. Rows are inserted in the same transaction as the
/// event they announce; the relay publishes them to the queue with the row id
/// as the dedup key and marks `processed_at` only after the publish succeeds.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Logical queue name the payload is destined for.
    pub destination: String,
    /// FIFO message group; the aggregate id for ordered delivery.
    pub message_group: Option<String>,
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub payload: Vec<u8>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub next_attempt_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
