use sea_orm_migration::prelude::*;

mod m20260601_000001_create_payment_tokens;
mod m20260601_000002_create_token_idempotency_keys;
mod m20260601_000003_create_encryption_keys;
mod m20260601_000004_create_decrypt_audit_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260601_000001_create_payment_tokens::Migration),
            Box::new(m20260601_000002_create_token_idempotency_keys::Migration),
            Box::new(m20260601_000003_create_encryption_keys::Migration),
            Box::new(m20260601_000004_create_decrypt_audit_log::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
