use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use log::{error, info};

use crate::metrics::Metrics;

pub fn router(path: &str, metrics: Metrics) -> Router {
    Router::new()
        .route(path, get(export))
        .with_state(metrics)
}

/// Serves the metrics text exposition until the listener fails.
pub async fn serve(listen: SocketAddr, path: String, metrics: Metrics) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind metrics listener on {listen}"))?;
    info!("serving metrics on http://{}{}", listen, path);

    axum::serve(listener, router(&path, metrics))
        .await
        .context("metrics server stopped")
}

async fn export(State(metrics): State<Metrics>) -> Response {
    match metrics.export() {
        Ok(body) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("failed to encode metrics by error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
