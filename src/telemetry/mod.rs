//! Logging and OpenTelemetry setup
//!
//! Installs the global `tracing` subscriber: an env filter, a pretty or JSON
//! fmt layer, and, when enabled, an OpenTelemetry layer exporting spans over
//! OTLP/HTTP.

pub mod propagation;

pub use propagation::{TraceContextMiddleware, TracePropagation};

use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LoggingConfig, TelemetryConfig};

/// Keeps the tracer provider alive; flushes pending spans when dropped
#[must_use = "dropping the guard shuts telemetry down"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

fn build_provider(service_name: &str, telemetry: &TelemetryConfig) -> anyhow::Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(telemetry.otlp_endpoint.clone())
        .build()?;

    let resource = Resource::builder_empty()
        .with_attributes([KeyValue::new(SERVICE_NAME, service_name.to_string())])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource)
        .build())
}

/// Install the global subscriber.
///
/// `default_service_name` is used when `telemetry.service_name` is unset.
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init(
    default_service_name: &str,
    logging: &LoggingConfig,
    telemetry: &TelemetryConfig,
) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;

    let fmt_layer = match logging.format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().boxed(),
    };

    let service_name = telemetry
        .service_name
        .clone()
        .unwrap_or_else(|| default_service_name.to_string());

    let provider = if telemetry.enabled {
        Some(build_provider(&service_name, telemetry)?)
    } else {
        None
    };

    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.clone())));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()?;

    if provider.is_some() {
        tracing::info!(
            service = %service_name,
            endpoint = %telemetry.otlp_endpoint,
            "OpenTelemetry export enabled"
        );
    }

    Ok(TelemetryGuard { provider })
}
