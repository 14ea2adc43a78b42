use sea_orm::entity::prelude::*;

/// Advisory processing locks, one row per in-flight authorization request.
/// A lock may be taken over only once `expires_at` has passed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_processing_locks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub auth_request_id: Uuid,
    pub worker_id: String,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
