//! HTTP server for exposing Prometheus metrics.
//!
//! Axum-based server with three routes: the configurable metrics path
//! (scrapes PBS on every request), a static info page at `/` and a `/health`
//! liveness probe. Concurrent scrape requests each run independently against
//! the shared read-only client and produce complete, self-contained sample
//! sets.

use crate::client::PbsClient;
use crate::collector;
use crate::error::{ExporterError, Result};
use crate::metrics;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<PbsClient>,
    pub metrics_path: String,
}

/// Build the router. Exposed separately from [`start_server`] so tests can
/// drive it over an ephemeral listener.
pub fn app(state: AppState) -> Router {
    let metrics_path = state.metrics_path.clone();
    Router::new()
        .route(&metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listener and serve until failure.
///
/// A bind or serve failure propagates out and terminates the process.
pub async fn start_server(listen_address: &str, state: AppState) -> Result<()> {
    let app = app(state);

    info!("Starting HTTP server on {}", listen_address);

    let listener = TcpListener::bind(listen_address).await?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ExporterError::Server(e.to_string()))?;

    Ok(())
}

/// Handler for the metrics path: one full scrape per request.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let outcome = collector::run_scrape(&state.client).await;
    if let Err(err) = &outcome {
        error!("scrape failed: {}", err);
    }

    match metrics::encode_scrape(outcome.as_ref().ok()) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {e}"),
            )
                .into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Handler for the root info page.
async fn root_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
<head><title>PBS Metrics Exporter</title></head>
<body>
<h1>Proxmox Backup Server Metrics Exporter</h1>
<p><a href='{}'>Metrics</a></p>
</body>
</html>"#,
        state.metrics_path
    ))
}
