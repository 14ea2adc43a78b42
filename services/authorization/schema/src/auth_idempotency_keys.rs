use sea_orm::entity::prelude::*;

/// Idempotency bindings for `POST /v1/authorize` and void requests, keyed
/// by (restaurant, client idempotency key, operation). The operation
/// discriminator keeps authorize and void key spaces separate, so a key
/// reused across the two operations never cross-matches. The fingerprint
/// detects replays whose body changed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_idempotency_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub restaurant_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub idempotency_key: String,
    /// "authorize" or "void".
    #[sea_orm(primary_key, auto_increment = false)]
    pub operation: String,
    pub auth_request_id: Uuid,
    pub fingerprint: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
