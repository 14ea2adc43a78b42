use sea_orm::entity::prelude::*;

/// Service encryption keys by version. Tokens keep decrypting under the
/// version they were written with; new tokens use the current version.
/// Key material is KMS-wrapped outside development deployments.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "encryption_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub version: String,
    pub key_material: String,
    pub is_current: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
