use std::sync::Arc;
use std::time::Duration;

use sea_orm::Database;
use tokio::sync::{Notify, watch};
use tracing::info;

use tably_authorization::config::AuthorizationConfig;
use tably_authorization::infra::relay::OutboxRelay;
use tably_authorization::router::build_router;
use tably_authorization::state::AppState;
use tably_core::config::Config;
use tably_core::tracing::init_tracing;
use tably_core::waiters::WaiterRegistry;
use tably_queue::redis::RedisFifoQueue;

#[tokio::main]
async fn main() {
    init_tracing("tably-authorization");

    let config = AuthorizationConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let relay_wakeup = Arc::new(Notify::new());
    let state = AppState {
        db,
        api_key: config.api_key.as_deref().map(Arc::from),
        waiters: WaiterRegistry::new(),
        relay_wakeup: relay_wakeup.clone(),
        fast_path_wait: Duration::from_millis(config.fast_path_wait_ms),
        fast_path_poll_interval: Duration::from_millis(config.fast_path_poll_interval_ms),
        auth_queue: config.auth_queue.clone(),
        void_queue: config.void_queue.clone(),
        idempotency_ttl_hours: config.idempotency_ttl_hours,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = OutboxRelay {
        store: state.outbox_store(),
        queue: RedisFifoQueue::new(redis),
        interval: Duration::from_millis(config.outbox_interval_ms),
        batch_size: config.outbox_batch_size,
        wakeup: relay_wakeup,
    };
    let relay_task = tokio::spawn(relay.run(shutdown_rx));

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.auth_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("authorization service listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("server error");

    // Let the relay finish its current pass before exiting.
    let _ = shutdown_tx.send(true);
    let _ = relay_task.await;
}
