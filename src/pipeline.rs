//! Postal code → temperature resolution pipeline
//!
//! Runs validation, geocoding, the weather lookup and the unit conversion in
//! strict order. The first failure ends the run and is returned unchanged.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::CepError;
use crate::geocoding::GeoResolver;
use crate::models::{AggregatedResult, Location, PostalCode, WeatherReading};
use crate::weather::WeatherResolver;

/// Pipeline state. Each variant carries the input of the step it names.
enum Stage<'a> {
    Validating(&'a str),
    Geocoding(PostalCode),
    FetchingWeather(Location),
    Converting(WeatherReading),
    Done(AggregatedResult),
}

impl fmt::Display for Stage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating(_) => "validating",
            Stage::Geocoding(_) => "geocoding",
            Stage::FetchingWeather(_) => "fetching_weather",
            Stage::Converting(_) => "converting",
            Stage::Done(_) => "done",
        };
        f.write_str(name)
    }
}

/// Orchestrates the two collaborator lookups for one request at a time
#[derive(Clone)]
pub struct TemperaturePipeline {
    geo: Arc<dyn GeoResolver>,
    weather: Arc<dyn WeatherResolver>,
}

impl TemperaturePipeline {
    pub fn new(geo: Arc<dyn GeoResolver>, weather: Arc<dyn WeatherResolver>) -> Self {
        Self { geo, weather }
    }

    /// Resolve `raw_cep` to its current temperature in three scales
    #[instrument(name = "resolve_temperature", skip(self, cancel))]
    pub async fn run(
        &self,
        raw_cep: &str,
        cancel: &CancellationToken,
    ) -> Result<AggregatedResult, CepError> {
        let mut stage = Stage::Validating(raw_cep);
        loop {
            debug!(%stage, "entering stage");
            stage = match stage {
                Stage::Validating(raw) => Stage::Geocoding(PostalCode::parse(raw)?),
                Stage::Geocoding(postal_code) => {
                    Stage::FetchingWeather(self.geo.resolve(&postal_code, cancel).await?)
                }
                Stage::FetchingWeather(location) => {
                    Stage::Converting(self.weather.current(&location.coordinate, cancel).await?)
                }
                Stage::Converting(reading) => Stage::Done(AggregatedResult::from_reading(reading)),
                Stage::Done(result) => return Ok(result),
            };
        }
    }
}
