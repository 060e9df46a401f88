//! HTTP transport: `/metrics` for scrapes and `/healthz` for liveness.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::ExporterError;
use crate::metrics::prom::PromPublisher;

pub fn router(publisher: Arc<PromPublisher>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(health))
        .with_state(publisher)
}

async fn metrics(State(publisher): State<Arc<PromPublisher>>) -> Response {
    match publisher.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok\n"
}

/// Binds `addr` and serves until `cancel` fires.
pub async fn serve(
    addr: SocketAddr,
    publisher: Arc<PromPublisher>,
    cancel: CancellationToken,
) -> Result<(), ExporterError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Server {
            address: addr.to_string(),
            source,
        })?;
    serve_on(listener, publisher, cancel).await
}

/// Serves on an already bound listener until `cancel` fires, then drains
/// in-flight requests.
pub async fn serve_on(
    listener: TcpListener,
    publisher: Arc<PromPublisher>,
    cancel: CancellationToken,
) -> Result<(), ExporterError> {
    let address = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    info!(listen_addr = %address, "HTTP server listening");

    axum::serve(listener, router(publisher))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|source| ExporterError::Server {
            address: address.clone(),
            source,
        })?;

    info!(listen_addr = %address, "HTTP server shut down");
    Ok(())
}
