use smart_energy_api::api::{self, AppState};
use smart_energy_api::measurements::{CandidateSet, MeasurementRepository, Normalizer};
use smart_energy_api::store::{InfluxStore, TimeSeriesStore};
use smart_energy_api::Config;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting smart-energy-api");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(
        meter_id = cfg.meter.meter_id,
        candidates = cfg.meter.manufacturer_macs.len(),
        "Configuration loaded"
    );

    let store = InfluxStore::new(&cfg.influxdb, cfg.sources.clone())?;
    match store.health_check().await {
        Ok(true) => info!(url = %cfg.influxdb.url, "Connected to InfluxDB"),
        Ok(false) => warn!(url = %cfg.influxdb.url, "InfluxDB reports unhealthy, continuing"),
        Err(e) => warn!(error = %e, "InfluxDB not reachable yet, continuing"),
    }

    let candidates = CandidateSet::new(cfg.meter.manufacturer_macs.clone())?;
    let repository = MeasurementRepository::new(
        Arc::new(store),
        candidates,
        Normalizer::new(cfg.tariffs.gas_price),
    );

    let addr = cfg.api_bind_address();
    let router = api::create_router(AppState {
        repository,
        config: Arc::new(cfg),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    let serve = axum::serve(listener, router);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    };

    if let Err(e) = serve.with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %e, "API server error");
    }

    info!("Application shutdown complete");
    Ok(())
}
