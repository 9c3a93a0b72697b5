//! Axum server setup and router configuration.

use axum::extract::State;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use relay_core::consumers::ConsumerStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the health router.
pub fn build_router(status: ConsumerStatus) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(status)
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    consumers: BTreeMap<&'static str, &'static str>,
}

/// Healthy only while every consumer is running; a consumer that stopped
/// or failed stays down until the relay restarts.
async fn health_check(State(status): State<ConsumerStatus>) -> impl IntoResponse {
    let consumers = status
        .states()
        .into_iter()
        .map(|(name, state)| (name, state.as_str()))
        .collect();
    let (code, label) = if status.all_running() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            consumers,
        }),
    )
}

/// Run the server until `shutdown` completes.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::consumers::{ConsumerError, ConsumerHandles, spawn_consumer};
    use relay_core::queue::QueueError;

    fn pending() -> impl Future<Output = Result<(), ConsumerError>> + Send + 'static {
        std::future::pending()
    }

    async fn serve(status: ConsumerStatus) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(status)).await.unwrap();
        });
        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn test_healthy_when_all_consumers_run() {
        let handles = ConsumerHandles::new(
            spawn_consumer("heimdall", pending()),
            spawn_consumer("bor", pending()),
            spawn_consumer("tasks", pending()),
        );
        let url = serve(handles.status()).await;

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["consumers"]["heimdall"], "running");
        assert_eq!(body["consumers"]["tasks"], "running");
    }

    #[tokio::test]
    async fn test_degraded_after_a_consumer_fails() {
        let handles = ConsumerHandles::new(
            spawn_consumer("heimdall", async {
                Err(ConsumerError::Queue(QueueError::Closed))
            }),
            spawn_consumer("bor", pending()),
            spawn_consumer("tasks", pending()),
        );
        let status = handles.status();
        while status.all_running() {
            tokio::task::yield_now().await;
        }
        let url = serve(status).await;

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["consumers"]["heimdall"], "failed");
        assert_eq!(body["consumers"]["bor"], "running");
    }
}
