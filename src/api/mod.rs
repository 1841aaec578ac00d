//! Resolver service HTTP API: `GET /{cep}`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    body::Body,
    extract::{Path, State, rejection::PathRejection},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{Instrument, field, info_span, warn};

use crate::config::ServiceConfig;
use crate::error::{CepError, ErrorMapper};
use crate::geocoding::NominatimResolver;
use crate::models::AggregatedResult;
use crate::pipeline::TemperaturePipeline;
use crate::telemetry::{TracePropagation, propagation::trace_id_from_headers};
use crate::upstream::http_client;
use crate::weather::WeatherApiResolver;
use crate::web::request_cancellation;

/// Shared, read-only state of the resolver service
#[derive(Clone)]
pub struct ResolverState {
    pub pipeline: TemperaturePipeline,
    pub propagation: TracePropagation,
    pub request_timeout: Duration,
}

impl ResolverState {
    /// Wire the production collaborators from configuration
    pub fn from_config(config: &ServiceConfig, propagation: TracePropagation) -> anyhow::Result<Self> {
        config.validate_resolver()?;

        let geo_client = http_client(
            Duration::from_secs(config.geocoding.timeout_seconds.into()),
            &config.geocoding.user_agent,
            Some(propagation.clone()),
        )
        .context("Failed to create geocoding HTTP client")?;

        let weather_client = http_client(
            Duration::from_secs(config.weather.timeout_seconds.into()),
            &config.weather.user_agent,
            Some(propagation.clone()),
        )
        .context("Failed to create weather HTTP client")?;

        let api_key = config.weather.api_key.clone().unwrap_or_default();

        let pipeline = TemperaturePipeline::new(
            Arc::new(NominatimResolver::new(geo_client, config.geocoding.base_url.clone())),
            Arc::new(WeatherApiResolver::new(
                weather_client,
                config.weather.base_url.clone(),
                api_key,
            )),
        );

        Ok(Self {
            pipeline,
            propagation,
            request_timeout: config.server.request_timeout(),
        })
    }
}

pub fn router(state: ResolverState) -> Router {
    Router::new()
        .route("/", get(get_temperature))
        .route("/{cep}", get(get_temperature))
        .with_state(state)
}

fn ok_response(result: &AggregatedResult) -> Result<Response, CepError> {
    let body = serde_json::to_vec(result)
        .map_err(|e| CepError::internal(format!("failed to serialize response: {e}")))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(body),
    )
        .into_response())
}

/// A postal code segment axum could not extract, e.g. invalid UTF-8 after
/// percent-decoding or an empty path. Its length is the decoded byte count.
fn rejected_postal_code(uri: &Uri, rejection: &PathRejection) -> CepError {
    let segment = uri.path().trim_start_matches('/');
    let length = urlencoding::decode_binary(segment.as_bytes()).len();
    warn!(%rejection, length, "postal code path segment rejected");
    CepError::InvalidInput { length }
}

async fn get_temperature(
    State(state): State<ResolverState>,
    uri: Uri,
    headers: HeaderMap,
    cep: Result<Path<String>, PathRejection>,
) -> Response {
    let span = info_span!("get_temperature", cep = field::Empty, trace_id = field::Empty);
    state.propagation.set_parent_from_headers(&span, &headers);
    if let Some(trace_id) = trace_id_from_headers(&headers) {
        span.record("trace_id", trace_id.as_str());
    }

    let (cancel, _cancel_on_drop) = request_cancellation(state.request_timeout);

    let outcome = async {
        let Path(cep) = cep.map_err(|rejection| rejected_postal_code(&uri, &rejection))?;
        tracing::Span::current().record("cep", cep.as_str());
        let result = state.pipeline.run(&cep, &cancel).await?;
        ok_response(&result)
    }
    .instrument(span.clone())
    .await;

    let _entered = span.enter();
    match outcome {
        Ok(response) => response,
        Err(err) => ErrorMapper::RESOLVER.respond(&err),
    }
}
