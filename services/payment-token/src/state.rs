use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::domain::encryption::AeadKey;
use crate::infra::db::{DbDecryptAuditRepository, DbKeyStore, DbTokenRepository};
use crate::usecase::create_token::ClientKeyResolver;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub api_key: Arc<String>,
    pub service_auth_token: Arc<String>,
    pub allowed_services: Arc<Vec<String>>,
    pub current_key_version: String,
    pub token_ttl_hours: u32,
    pub primary_key: Option<AeadKey>,
    pub base_derivation_key: Option<AeadKey>,
}

impl AppState {
    pub fn token_repo(&self) -> DbTokenRepository {
        DbTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn key_store(&self) -> DbKeyStore {
        DbKeyStore {
            db: self.db.clone(),
            current_version: self.current_key_version.clone(),
        }
    }

    pub fn audit_repo(&self) -> DbDecryptAuditRepository {
        DbDecryptAuditRepository {
            db: self.db.clone(),
        }
    }

    pub fn key_resolver(&self) -> ClientKeyResolver {
        ClientKeyResolver {
            primary_key: self.primary_key.clone(),
            base_derivation_key: self.base_derivation_key.clone(),
        }
    }
}
