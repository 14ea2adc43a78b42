use sea_orm::entity::prelude::*;

/// Per-restaurant processor selection and configuration. `processor_config`
/// is the tagged `ProcessorConfig` document from `tably-domain`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "restaurant_payment_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub restaurant_id: Uuid,
    pub processor_config: Json,
    pub config_version: String,
    pub statement_descriptor: Option<String>,
    pub metadata: Option<Json>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
