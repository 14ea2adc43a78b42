use axum::Json;
use axum::http::StatusCode;

/// Handler for `GET /healthz`. Liveness only: answers as long as the
/// process is up, so orchestrators never restart a service for slow
/// dependencies.
pub async fn healthz() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Handler for `GET /readyz`. Payment services are ready once their pools
/// are constructed; construction happens before the listener binds, so a
/// reachable listener implies readiness. Wrap per service if a deeper
/// probe is ever needed.
pub async fn readyz() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (status, body) = healthz().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0["status"], "ok");
    }

    #[tokio::test]
    async fn readyz_reports_ready() {
        let (status, body) = readyz().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0["status"], "ready");
    }
}
