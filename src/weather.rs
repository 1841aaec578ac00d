//! Current weather lookup
//!
//! [`WeatherResolver`] turns a coordinate into the current temperature.
//! [`WeatherApiResolver`] is the production implementation backed by the
//! weatherapi.com `current.json` endpoint.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::CepError;
use crate::models::{Coordinate, WeatherReading};
use crate::upstream;

const SERVICE: &str = "weather";

/// Resolves a coordinate to the current weather reading
#[async_trait]
pub trait WeatherResolver: Send + Sync {
    async fn current(
        &self,
        coordinate: &Coordinate,
        cancel: &CancellationToken,
    ) -> Result<WeatherReading, CepError>;
}

/// `current.json` response, reduced to the fields in use
#[derive(Debug, Deserialize)]
struct CurrentResponse {
    location: ResponseLocation,
    current: ResponseCurrent,
}

#[derive(Debug, Deserialize)]
struct ResponseLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResponseCurrent {
    temp_c: f64,
    temp_f: Option<f64>,
}

impl From<CurrentResponse> for WeatherReading {
    fn from(response: CurrentResponse) -> Self {
        Self {
            location_name: response.location.name,
            temperature_c: response.current.temp_c,
            reported_temperature_f: response.current.temp_f,
        }
    }
}

/// weatherapi.com client
pub struct WeatherApiResolver {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl WeatherApiResolver {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn current_url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/current.json?key={}&q={},{}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&coordinate.latitude),
            urlencoding::encode(&coordinate.longitude)
        )
    }
}

#[async_trait]
impl WeatherResolver for WeatherApiResolver {
    #[instrument(name = "fetch_current_weather", skip_all, fields(lat = %coordinate.latitude, lon = %coordinate.longitude))]
    async fn current(
        &self,
        coordinate: &Coordinate,
        cancel: &CancellationToken,
    ) -> Result<WeatherReading, CepError> {
        let response: CurrentResponse =
            upstream::fetch_json(&self.client, &self.current_url(coordinate), cancel)
                .await
                .map_err(|e| CepError::upstream(SERVICE, e))?;

        let reading = WeatherReading::from(response);
        info!(
            "Current weather at {}: {} {:.1}°C",
            coordinate, reading.location_name, reading.temperature_c
        );
        Ok(reading)
    }
}
