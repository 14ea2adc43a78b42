use sea_orm_migration::prelude::*;

mod m20260601_000001_create_payment_events;
mod m20260601_000002_create_auth_request_state;
mod m20260601_000003_create_outbox_messages;
mod m20260601_000004_create_auth_idempotency_keys;
mod m20260601_000005_create_auth_processing_locks;
mod m20260601_000006_create_restaurant_payment_configs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260601_000001_create_payment_events::Migration),
            Box::new(m20260601_000002_create_auth_request_state::Migration),
            Box::new(m20260601_000003_create_outbox_messages::Migration),
            Box::new(m20260601_000004_create_auth_idempotency_keys::Migration),
            Box::new(m20260601_000005_create_auth_processing_locks::Migration),
            Box::new(m20260601_000006_create_restaurant_payment_configs::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
