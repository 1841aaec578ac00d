//! Data models for the CEP weather services
//!
//! - Location: postal code, coordinates and the geocoded candidate
//! - Weather: the current reading and the aggregated three-scale result

pub mod location;
pub mod weather;

pub use location::{Address, Coordinate, Location, PostalCode};
pub use weather::{AggregatedResult, WeatherReading, celsius_to_fahrenheit, celsius_to_kelvin};
