//! Gateway service: `POST /` with `{"cep": "..."}`
//!
//! Validates the postal code, forwards it to the resolver service with the
//! caller's trace context and relays the resolver's answer untouched.

use std::time::{Duration, Instant};

use anyhow::Context;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, HeaderValue, header},
    response::Response,
    routing::post,
};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, field, info_span};

use crate::config::ServiceConfig;
use crate::error::{CepError, ErrorMapper, UpstreamError};
use crate::models::PostalCode;
use crate::telemetry::{TracePropagation, propagation::trace_id_from_headers};
use crate::upstream::{self, http_client};
use crate::web::request_cancellation;

const SERVICE: &str = "resolver";

#[derive(Debug, Deserialize)]
pub struct TemperatureRequest {
    #[serde(default)]
    pub cep: String,
}

/// Shared, read-only state of the gateway service
#[derive(Clone)]
pub struct GatewayState {
    pub client: ClientWithMiddleware,
    pub resolver_url: String,
    pub propagation: TracePropagation,
    pub request_timeout: Duration,
}

impl GatewayState {
    pub fn from_config(config: &ServiceConfig, propagation: TracePropagation) -> anyhow::Result<Self> {
        let client = http_client(
            Duration::from_secs(config.gateway.timeout_seconds.into()),
            &config.gateway.user_agent,
            Some(propagation.clone()),
        )
        .context("Failed to create resolver HTTP client")?;

        Ok(Self {
            client,
            resolver_url: config.gateway.resolver_url.trim_end_matches('/').to_string(),
            propagation,
            request_timeout: config.server.request_timeout(),
        })
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", post(forward_temperature))
        .with_state(state)
}

/// Forward a validated postal code and relay the resolver's status, body and
/// content type
async fn forward(
    state: &GatewayState,
    body: &[u8],
    cancel: &CancellationToken,
) -> Result<Response, CepError> {
    let request: TemperatureRequest = serde_json::from_slice(body)
        .map_err(|e| CepError::internal(format!("failed to decode request body: {e}")))?;
    let postal_code = PostalCode::parse(&request.cep)?;

    let url = format!(
        "{}/{}",
        state.resolver_url,
        urlencoding::encode(postal_code.as_str())
    );
    let start = Instant::now();
    let upstream_response = async {
        let response = upstream::send(&state.client, &url, cancel).await?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.without_url().into()))?;
        Ok::<_, UpstreamError>((status, content_type, bytes))
    }
    .instrument(info_span!("forward_to_resolver", cep = %postal_code))
    .await
    .map_err(|e| CepError::upstream(SERVICE, e))?;

    let (status, content_type, bytes) = upstream_response;
    debug!(%status, elapsed_s = start.elapsed().as_secs_f64(), "resolver answered");
    relay(status, content_type, bytes)
}

fn relay(
    status: axum::http::StatusCode,
    content_type: Option<HeaderValue>,
    bytes: Bytes,
) -> Result<Response, CepError> {
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(bytes))
        .map_err(|e| CepError::internal(format!("failed to build relayed response: {e}")))
}

async fn forward_temperature(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let span = info_span!("handle_temperature_request", trace_id = field::Empty);
    state.propagation.set_parent_from_headers(&span, &headers);
    if let Some(trace_id) = trace_id_from_headers(&headers) {
        span.record("trace_id", trace_id.as_str());
    }

    let (cancel, _cancel_on_drop) = request_cancellation(state.request_timeout);

    let outcome = async {
        let body = body
            .map_err(|e| CepError::internal(format!("failed to read request body: {e}")))?;
        forward(&state, &body, &cancel).await
    }
    .instrument(span.clone())
    .await;

    let _entered = span.enter();
    match outcome {
        Ok(response) => response,
        Err(err) => ErrorMapper::GATEWAY.respond(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_request_body_parsing() {
        let request: TemperatureRequest = serde_json::from_slice(br#"{"cep":"01001000"}"#).unwrap();
        assert_eq!(request.cep, "01001000");

        let request: TemperatureRequest = serde_json::from_slice(b"{}").unwrap();
        assert_eq!(request.cep, "");

        assert!(serde_json::from_slice::<TemperatureRequest>(br#"{"cep":1001000}"#).is_err());
    }

    #[test]
    fn test_relay_keeps_status_and_content_type() {
        let response = relay(
            StatusCode::NOT_FOUND,
            Some(HeaderValue::from_static("application/json")),
            Bytes::from_static(br#"{"message":"can not find zipcode","code":404}"#),
        )
        .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
