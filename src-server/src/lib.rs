pub mod app;
pub mod config;
pub mod relay;
pub mod server;
pub mod shutdown;

use alert_client::{AlertApiClient, AlertBackend, RealtimeConfig};
use tracing_subscriber::EnvFilter;

use config::AppConfig;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Load environment and runtime configuration.
pub fn init_foundation() -> Result<AppConfig, anyhow::Error> {
    load_dotenv();
    let config = AppConfig::load()?;

    tracing::info!(
        port = config.server_port,
        realtime = config.realtime_url.is_some(),
        "Settings loaded"
    );
    Ok(config)
}

/// Build the REST + realtime backend described by `config`.
pub fn build_backend(config: &AppConfig) -> Result<AlertBackend, anyhow::Error> {
    let api = AlertApiClient::new(&config.api_base_url, config.api_key.clone())?;
    let realtime = config
        .realtime_url
        .as_ref()
        .map(|url| RealtimeConfig::new(url.clone(), config.api_key.clone()));
    if realtime.is_none() {
        tracing::warn!("ALERT_REALTIME_URL not set; only the initial fetch will deliver alerts");
    }
    Ok(AlertBackend::new(api, realtime))
}
