//! Prometheus exposition endpoint.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trafficctl_telemetry::Metrics;

use crate::error::AppResult;

async fn metrics() -> Response {
    match Metrics::encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn create_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
}

/// Serve metrics on `127.0.0.1:<port>` until `shutdown` fires.
pub async fn run_metrics_server(port: u16, shutdown: CancellationToken) -> AppResult<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Serving metrics");

    axum::serve(listener, create_router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serves_metrics_text() {
        Metrics::stale_discarded("console_test");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, create_router())
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("trafficctl_stale_discard_total"));

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
