//! Weather reading and the aggregated temperature result

use serde::{Deserialize, Serialize};

/// Integer Kelvin offset. Clients depend on 273, not 273.15.
pub const KELVIN_OFFSET: f64 = 273.0;

/// Current observation returned by the weather collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Location name as reported by the weather service
    pub location_name: String,
    /// Temperature in Celsius
    pub temperature_c: f64,
    /// Temperature in Fahrenheit as reported by the service, informational only
    pub reported_temperature_f: Option<f64>,
}

/// Response body of a successful resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub city: String,
    pub temp_c: f64,
    pub temp_f: f64,
    pub temp_k: f64,
}

impl AggregatedResult {
    /// Build the result from a reading, converting from Celsius
    #[must_use]
    pub fn from_reading(reading: WeatherReading) -> Self {
        let celsius = reading.temperature_c;
        Self {
            city: reading.location_name,
            temp_c: celsius,
            temp_f: celsius_to_fahrenheit(celsius),
            temp_k: celsius_to_kelvin(celsius),
        }
    }
}

#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[must_use]
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}
