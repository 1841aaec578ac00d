//! Postal code, coordinate and geocoded location models

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CepError;

/// Number of bytes a postal code must have to be accepted
pub const POSTAL_CODE_LEN: usize = 8;

/// A postal code that passed the length check
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PostalCode(String);

impl PostalCode {
    /// Accept the raw value unchanged if it is exactly eight bytes long.
    ///
    /// No trimming and no character-class check is applied.
    pub fn parse(raw: &str) -> Result<Self, CepError> {
        if raw.len() != POSTAL_CODE_LEN {
            return Err(CepError::InvalidInput { length: raw.len() });
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latitude/longitude as decimal text, exactly as the geocoder returned them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: String,
    pub longitude: String,
}

impl Coordinate {
    #[must_use]
    pub fn new(latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }

    /// `lat,lon` form used as the weather query
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Structured address details of a geocoding candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub postcode: Option<String>,
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// The geocoding candidate chosen for a postal code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub coordinate: Coordinate,
    pub display_name: String,
    pub address: Option<Address>,
}

impl Location {
    #[must_use]
    pub fn new(coordinate: Coordinate, display_name: impl Into<String>) -> Self {
        Self {
            coordinate,
            display_name: display_name.into(),
            address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("123")]
    #[case("0100100")]
    #[case("010010000")]
    #[case("abcdefghijklmnop")]
    #[case("        x")]
    fn test_wrong_length_is_invalid_input(#[case] raw: &str) {
        let err = PostalCode::parse(raw).unwrap_err();
        assert!(matches!(err, CepError::InvalidInput { length } if length == raw.len()));
    }

    #[rstest]
    #[case("01001000")]
    #[case("abcdefgh")]
    #[case("01001-00")]
    #[case(" 1001000")]
    fn test_eight_bytes_is_accepted_unchanged(#[case] raw: &str) {
        let code = PostalCode::parse(raw).unwrap();
        assert_eq!(code.as_str(), raw);
    }

    #[test]
    fn test_length_is_counted_in_bytes() {
        // four two-byte characters
        assert!(PostalCode::parse("çççç").is_ok());
        assert!(PostalCode::parse("çççççççç").is_err());
    }

    #[test]
    fn test_coordinate_query_keeps_text() {
        let coordinate = Coordinate::new("-23.5506507", "-46.6333824");
        assert_eq!(coordinate.to_query(), "-23.5506507,-46.6333824");
    }
}
