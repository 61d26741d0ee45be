use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use finsync::{
    api::{self, AppState},
    config::{CliArgs, Config, LoggingConfig},
    storage,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_tracing(&config.logging);

    let connector = match storage::open_connector(&config.storage) {
        Ok(connector) => Some(connector),
        Err(e) => {
            tracing::error!(
                url_env = %config.storage.url_env,
                error = %e,
                "Storage not configured, data requests will fail"
            );
            None
        }
    };

    let mut state = AppState::new(connector).with_body_limit(config.server.max_body_bytes);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "Metrics exporter not installed"),
    }

    let app = api::router(state);
    let addr = config.listen_addr()?;

    tracing::info!(%addr, "API listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
