use anyhow::Result;
use clap::Parser;
use pbs_metrics_exporter::{
    client::PbsClient,
    config::Settings,
    server::{start_server, AppState},
};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Malformed flag or environment values exit non-zero here.
    let settings = Settings::parse();
    settings.validate()?;

    init_logging(&settings.log_level)?;

    info!("Starting PBS metrics exporter");
    debug!("Using settings: {:?}", settings);
    info!("PBS endpoint: {}", settings.endpoint);
    info!("Listen address: {}", settings.listen_address);
    info!("Metrics path: {}", settings.metrics_path);

    let client = PbsClient::new(&settings)?;
    let state = AppState {
        client: Arc::new(client),
        metrics_path: settings.metrics_path.clone(),
    };

    if let Err(e) = start_server(&settings.listen_address, state).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// Initialize structured logging with tracing.
fn init_logging(log_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
