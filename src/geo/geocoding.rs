// Geocoding gateway - resolves free-text addresses to coordinates

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::Coordinate;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// One upstream lookup per call. `NotFound` when the service knows no
    /// match, `Upstream` when it cannot be reached.
    async fn resolve(&self, address: &str) -> AppResult<Coordinate>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn first_location(self) -> AppResult<Coordinate> {
        match self.results.into_iter().next() {
            Some(result) => Ok(Coordinate {
                latitude: result.geometry.location.lat,
                longitude: result.geometry.location.lng,
            }),
            None => match self.status.as_deref() {
                None | Some("OK") | Some("ZERO_RESULTS") => {
                    Err(AppError::NotFound("Address Not Found".to_string()))
                }
                Some(status) => Err(AppError::Upstream(format!(
                    "Geocoding failed with status {}: {}",
                    status,
                    self.error_message.unwrap_or_default()
                ))),
            },
        }
    }
}

/// Google Maps geocoding API client
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| {
                AppError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, address: &str) -> AppResult<Coordinate> {
        debug!("Geocoding '{}'", address);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Geocoding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Geocoding service answered {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed geocoding reply: {}", e)))?;
        body.first_location()
    }
}

/// Fixed address table. Lookups are case-insensitive on the trimmed address.
#[derive(Debug, Default, Clone)]
pub struct StaticGeocoder {
    table: HashMap<String, Coordinate>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, coordinate: Coordinate) -> Self {
        self.table.insert(Self::key(address), coordinate);
        self
    }

    fn key(address: &str) -> String {
        address.trim().to_lowercase()
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn resolve(&self, address: &str) -> AppResult<Coordinate> {
        self.table
            .get(&Self::key(address))
            .copied()
            .ok_or_else(|| AppError::NotFound("Address Not Found".to_string()))
    }
}
