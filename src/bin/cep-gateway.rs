use anyhow::Result;
use cep_weather::{ServiceConfig, TracePropagation, gateway, telemetry, web};

const DEFAULT_PORT: u16 = 8081;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;
    let _telemetry = telemetry::init("cep-gateway", &config.logging, &config.telemetry)?;

    let state = gateway::GatewayState::from_config(&config, TracePropagation::w3c())?;
    tracing::info!(
        resolver = %state.resolver_url,
        "Starting gateway service v{}",
        cep_weather::VERSION
    );

    web::run(config.server.port.unwrap_or(DEFAULT_PORT), gateway::router(state)).await
}
