//! `cep-weather` - current temperature for a Brazilian postal code (CEP)
//!
//! Two services share this library. The gateway accepts `POST /` and
//! forwards the postal code, with its trace context, to the resolver. The
//! resolver geocodes the postal code, fetches the current weather at those
//! coordinates and answers with the temperature in Celsius, Fahrenheit and
//! Kelvin.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod geocoding;
pub mod models;
pub mod pipeline;
pub mod telemetry;
pub mod upstream;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use config::ServiceConfig;
pub use error::{CepError, ErrorMapper, UpstreamError};
pub use geocoding::{GeoResolver, NominatimResolver};
pub use models::{AggregatedResult, Coordinate, Location, PostalCode, WeatherReading};
pub use pipeline::TemperaturePipeline;
pub use telemetry::TracePropagation;
pub use weather::{WeatherApiResolver, WeatherResolver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, CepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
