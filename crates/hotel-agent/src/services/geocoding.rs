//! Place name resolution.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{ServiceError, ServiceErrorKind};
use crate::config::GeocodingConfig;

/// A point on the globe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A service that turns a place name into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves `location`.
    async fn geocode(&self, location: &str) -> Result<Coordinates, ServiceError>;
}

/// A client of the Google Geocoding API.
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Creates a client from the configuration.
    pub fn new(config: &GeocodingConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build a http client with timeout: {err}");
                Client::new()
            });
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, location: &str) -> Result<Coordinates, ServiceError> {
        let url = Url::parse_with_params(
            &self.endpoint,
            [("address", location), ("key", self.api_key.as_str())],
        )
        .map_err(|err| {
            ServiceError::new(
                ServiceErrorKind::Rejected,
                format!("invalid geocoding endpoint: {err}"),
            )
        })?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(ServiceError::from_reqwest)?;
        let body = resp.text().await.map_err(ServiceError::from_reqwest)?;
        let coordinates = parse_geocode_response(location, &body)?;
        debug!("geocoded {location:?} to {coordinates:?}");
        Ok(coordinates)
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn parse_geocode_response(
    location: &str,
    body: &str,
) -> Result<Coordinates, ServiceError> {
    let resp: GeocodeResponse = serde_json::from_str(body).map_err(|err| {
        ServiceError::new(ServiceErrorKind::InvalidResponse, format!("{err}"))
    })?;
    if resp.status != "OK" {
        return Err(ServiceError::new(
            ServiceErrorKind::Rejected,
            format!("Geocoding failed for {location}: {}", resp.status),
        ));
    }
    let Some(result) = resp.results.into_iter().next() else {
        return Err(ServiceError::new(
            ServiceErrorKind::InvalidResponse,
            format!("Geocoding returned no results for {location}"),
        ));
    };
    Ok(Coordinates {
        latitude: result.geometry.location.lat,
        longitude: result.geometry.location.lng,
    })
}
