use sea_orm::entity::prelude::*;

/// A stored payment token: card data encrypted under a service key version,
/// scoped to the owning restaurant, expiring after a bounded TTL. Metadata
/// columns hold only non-sensitive fields (brand, last4, expiry).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token_id: String,
    pub restaurant_id: Uuid,
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub ciphertext: Vec<u8>,
    #[sea_orm(column_type = "VarBinary(StringLen::None)")]
    pub nonce: Vec<u8>,
    pub service_key_version: String,
    /// Key id or device credential the client encrypted with, kept for audit
    /// and rotation. Never returned by any API.
    pub origin_key_id: String,
    pub card_brand: String,
    pub last4: String,
    pub exp_month: i32,
    pub exp_year: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
