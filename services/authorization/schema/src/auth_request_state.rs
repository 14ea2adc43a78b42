use sea_orm::entity::prelude::*;

/// Read model for authorization requests, updated in the same transaction as
/// the event that justifies each change. `latest_sequence` always equals the
/// newest event's sequence number for the aggregate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_request_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub auth_request_id: Uuid,
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub latest_sequence: i64,
    pub processor_name: Option<String>,
    pub processor_auth_id: Option<String>,
    pub authorization_code: Option<String>,
    pub authorized_amount_minor: Option<i64>,
    pub denial_code: Option<String>,
    pub denial_reason: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub metadata: Option<Json>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
