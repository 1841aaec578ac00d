//! HTTP plumbing shared by the collaborator clients

use std::time::{Duration, Instant};

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::UpstreamError;
use crate::telemetry::{TraceContextMiddleware, TracePropagation};

const SLOW_RESPONSE: Duration = Duration::from_secs(5);

/// Build a collaborator HTTP client.
///
/// With `propagation` set, every request carries the current span's trace
/// context; without it the client sends plain requests.
pub fn http_client(
    timeout: Duration,
    user_agent: &str,
    propagation: Option<TracePropagation>,
) -> reqwest::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()?;

    let mut builder = ClientBuilder::new(client);
    if let Some(propagation) = propagation {
        builder = builder.with(TraceContextMiddleware::new(propagation));
    }
    Ok(builder.build())
}

/// Strip the query string, which may hold credentials
fn loggable(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Strip the URL from transport errors; its query may hold credentials
fn redact(err: reqwest_middleware::Error) -> UpstreamError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => {
            UpstreamError::Transport(reqwest_middleware::Error::Reqwest(e.without_url()))
        }
        other => UpstreamError::Transport(other),
    }
}

/// Send the request unless `cancel` fires first
pub async fn send(
    client: &ClientWithMiddleware,
    url: &str,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, UpstreamError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UpstreamError::Cancelled),
        response = client.get(url).send() => response.map_err(redact),
    }
}

/// GET `url` and decode a JSON body of type `T`
pub async fn fetch_json<T: DeserializeOwned>(
    client: &ClientWithMiddleware,
    url: &str,
    cancel: &CancellationToken,
) -> Result<T, UpstreamError> {
    let endpoint = loggable(url);
    let start = Instant::now();
    debug!(endpoint, "sending request");

    let response = send(client, url, cancel).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status(status));
    }

    let body = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(UpstreamError::Cancelled),
        body = response.json::<T>() => body.map_err(|e| UpstreamError::Decode(e.without_url()))?,
    };

    let elapsed = start.elapsed();
    debug!(endpoint, %status, elapsed_s = elapsed.as_secs_f64(), "response decoded");
    if elapsed > SLOW_RESPONSE {
        warn!(endpoint, "Slow API response detected: {:.3}s", elapsed.as_secs_f64());
    }

    Ok(body)
}
