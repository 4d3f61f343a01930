//! Minimal HTTP health endpoint for container orchestration probes.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

/// Build the health router, serving the same payload on `/` and `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "watchtracks",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Bind the health server on the given port and serve until the task is dropped.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Health endpoint listening on {}", addr);
    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_payload() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "watchtracks");
        assert!(body["timestamp"].as_str().is_some());
    }
}
