use sea_orm::entity::prelude::*;

/// One row per decrypt attempt, success or not. Retained long-term.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "decrypt_audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub token_id: String,
    pub restaurant_id: Uuid,
    pub requesting_service: String,
    /// "success", "denied", "not_found", or "expired".
    pub result: String,
    pub correlation_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
