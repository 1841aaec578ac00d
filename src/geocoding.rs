//! Postal code geocoding
//!
//! [`GeoResolver`] turns a validated postal code into the first location the
//! geocoding service knows for it. [`NominatimResolver`] is the production
//! implementation backed by the OpenStreetMap Nominatim search API.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::CepError;
use crate::models::{Address, Coordinate, Location, PostalCode};
use crate::upstream;

const SERVICE: &str = "geocoding";

/// Resolves a postal code to a location
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// First candidate for `postal_code`, `NotFound` when there is none
    async fn resolve(
        &self,
        postal_code: &PostalCode,
        cancel: &CancellationToken,
    ) -> Result<Location, CepError>;
}

/// One record of a Nominatim `format=jsonv2` search response
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    postcode: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl From<NominatimPlace> for Location {
    fn from(place: NominatimPlace) -> Self {
        Self {
            coordinate: Coordinate::new(place.lat, place.lon),
            display_name: place.display_name,
            address: place.address.map(|a| Address {
                postcode: a.postcode,
                suburb: a.suburb,
                city: a.city,
                municipality: a.municipality,
                state: a.state,
                country: a.country,
                country_code: a.country_code,
            }),
        }
    }
}

/// Nominatim search client
pub struct NominatimResolver {
    client: ClientWithMiddleware,
    base_url: String,
}

impl NominatimResolver {
    pub fn new(client: ClientWithMiddleware, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, postal_code: &PostalCode) -> String {
        format!(
            "{}/search?q={}&format=jsonv2&addressdetails=1",
            self.base_url,
            urlencoding::encode(postal_code.as_str())
        )
    }
}

#[async_trait]
impl GeoResolver for NominatimResolver {
    #[instrument(name = "geocode_postal_code", skip_all, fields(cep = %postal_code))]
    async fn resolve(
        &self,
        postal_code: &PostalCode,
        cancel: &CancellationToken,
    ) -> Result<Location, CepError> {
        let places: Vec<NominatimPlace> =
            upstream::fetch_json(&self.client, &self.search_url(postal_code), cancel)
                .await
                .map_err(|e| CepError::upstream(SERVICE, e))?;

        debug!(candidates = places.len(), "geocoding response received");

        let Some(place) = places.into_iter().next() else {
            warn!("No geocoding results for postal code");
            return Err(CepError::NotFound {
                postal_code: postal_code.to_string(),
            });
        };

        let location = Location::from(place);
        info!(
            "Found location for postal code {}: {} {}",
            postal_code, location.display_name, location.coordinate
        );
        Ok(location)
    }
}
