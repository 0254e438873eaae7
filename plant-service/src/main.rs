use anyhow::Result;
use plant_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability, store, PlantAggregationService,
};
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr).await?;
    }

    // Constructed once and shared by every request.
    let store = store::from_config(&cfg).await?;
    let service = PlantAggregationService::new(store).with_batch_size(cfg.refresh.batch_size);

    let state = AppState {
        service: Arc::new(service),
        default_sheet: cfg.refresh.default_sheet.clone(),
        expose_diagnostics: cfg.environment.exposes_diagnostics(),
    };
    let app = api::router(state);

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?cfg.environment,
        "plant service listening: POST /api/v1/plants/update, GET /api/v1/plants"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("plant service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
