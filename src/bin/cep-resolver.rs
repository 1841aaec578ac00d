use anyhow::Result;
use cep_weather::{ServiceConfig, TracePropagation, api, telemetry, web};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;
    let _telemetry = telemetry::init("cep-resolver", &config.logging, &config.telemetry)?;

    let state = api::ResolverState::from_config(&config, TracePropagation::w3c())?;
    tracing::info!(
        geocoding = %config.geocoding.base_url,
        weather = %config.weather.base_url,
        "Starting resolver service v{}",
        cep_weather::VERSION
    );

    web::run(config.server.port.unwrap_or(DEFAULT_PORT), api::router(state)).await
}
