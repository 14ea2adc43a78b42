use std::sync::Arc;
use std::time::Duration;

use sea_orm::Database;
use tokio::sync::watch;
use tracing::info;

use tably_auth_worker::config::WorkerConfig;
use tably_auth_worker::consumer::{WorkerConsumer, run_lock_cleanup};
use tably_auth_worker::infra::locking::DbLockManager;
use tably_auth_worker::infra::store::DbPaymentStore;
use tably_auth_worker::infra::token_client::GrpcTokenDecryptor;
use tably_auth_worker::processor::AuthRequestProcessor;
use tably_core::config::Config;
use tably_core::tracing::init_tracing;
use tably_queue::redis::RedisFifoQueue;

#[tokio::main]
async fn main() {
    init_tracing("tably-auth-worker");

    let config = WorkerConfig::from_env();
    let worker_id = config.worker_id();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let token_channel = tonic::transport::Channel::from_shared(config.token_grpc_url.clone())
        .expect("invalid TOKEN_GRPC_URL")
        .connect_lazy();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    for consumer_index in 0..config.concurrency {
        let consumer = WorkerConsumer {
            queue: RedisFifoQueue::new(redis.clone())
                .with_max_receive_count(config.max_retries + 1),
            processor: AuthRequestProcessor {
                store: DbPaymentStore {
                    db: db.clone(),
                    worker_id: worker_id.clone(),
                },
                locks: DbLockManager { db: db.clone() },
                tokens: GrpcTokenDecryptor::new(
                    token_channel.clone(),
                    config.service_auth_token.clone(),
                    "auth-processor-worker".to_owned(),
                ),
                worker_id: format!("{worker_id}-{consumer_index}"),
                lock_ttl: Duration::from_secs(config.lock_ttl_seconds),
                max_retries: config.max_retries,
                processor_timeout: Duration::from_millis(config.processor_timeout_ms),
                waiters: None,
            },
            auth_queue: config.auth_queue.clone(),
            void_queue: config.void_queue.clone(),
            visibility: Duration::from_secs(config.visibility_timeout_seconds),
            queue_wait: Duration::from_secs(config.queue_wait_seconds),
        };
        let consumer = Arc::new(consumer);
        let auth_shutdown = shutdown_rx.clone();
        let auth_consumer = consumer.clone();
        tasks.push(tokio::spawn(async move {
            auth_consumer.run_auth_loop(auth_shutdown).await;
        }));
        // One void consumer is enough; the queue is low-volume.
        if consumer_index == 0 {
            let void_shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                consumer.run_void_loop(void_shutdown).await;
            }));
        }
    }

    tasks.push(tokio::spawn(run_lock_cleanup(
        DbLockManager { db: db.clone() },
        Duration::from_secs(config.lock_cleanup_interval_seconds),
        shutdown_rx,
    )));

    info!(worker_id = %worker_id, concurrency = config.concurrency, "auth processor worker started");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    info!("shutdown signal received, draining consumers");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        let _ = task.await;
    }
    info!("worker exited");
}
