use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use tably_core::config::Config;
use tably_core::tracing::init_tracing;
use tably_payment_token::config::TokenConfig;
use tably_payment_token::domain::encryption::AeadKey;
use tably_payment_token::grpc_server::TokenGrpcServer;
use tably_payment_token::router::build_router;
use tably_payment_token::state::AppState;
use tably_proto::payments::v1::payment_token_service_server::PaymentTokenServiceServer;

#[tokio::main]
async fn main() {
    init_tracing("tably-payment-token");

    let config = TokenConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let primary_key = config.primary_encryption_key.as_deref().map(|hex_key| {
        AeadKey::from_hex(hex_key).expect("PRIMARY_ENCRYPTION_KEY must be 32 bytes of hex")
    });
    let base_derivation_key = config.base_derivation_key.as_deref().map(|hex_key| {
        AeadKey::from_hex(hex_key).expect("BASE_DERIVATION_KEY must be 32 bytes of hex")
    });

    let state = AppState {
        db,
        api_key: Arc::new(config.api_key.clone()),
        service_auth_token: Arc::new(config.service_auth_token.clone()),
        allowed_services: Arc::new(config.allowed_services()),
        current_key_version: config.current_key_version.clone(),
        token_ttl_hours: config.token_ttl_hours,
        primary_key,
        base_derivation_key,
    };

    let router = build_router(state.clone());
    let http_addr = format!("0.0.0.0:{}", config.token_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind");

    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .expect("invalid gRPC address");
    let grpc = tonic::transport::Server::builder()
        .add_service(PaymentTokenServiceServer::new(TokenGrpcServer { state }))
        .serve(grpc_addr);

    info!("payment token service listening on {http_addr} (gRPC on {grpc_addr})");
    tokio::select! {
        result = axum::serve(listener, router) => result.expect("server error"),
        result = grpc => result.expect("gRPC server error"),
    }
}
