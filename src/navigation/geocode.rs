//! Destination name resolution

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::geo::LatLng;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves a spoken place name to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `query`, or `None` if nothing matches
    async fn geocode(&self, query: &str) -> Result<Option<LatLng>>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

/// Parse a geocoding response body, taking the first result
///
/// # Errors
///
/// Returns error if the body is malformed or the service refused the request
pub fn parse_geocode(body: &str) -> Result<Option<LatLng>> {
    let response: GeocodeResponse = serde_json::from_str(body)?;

    match response.status.as_deref() {
        Some("REQUEST_DENIED" | "INVALID_REQUEST" | "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR") => {
            Err(Error::Geocoding(format!(
                "{}: {}",
                response.status.unwrap_or_default(),
                response.error_message.unwrap_or_default()
            )))
        }
        _ => Ok(response.results.into_iter().next().map(|r| r.geometry.location)),
    }
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Google Maps API key required".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    #[must_use]
    pub fn request_url(&self, query: &str) -> String {
        format!(
            "{}/maps/api/geocode/json?address={}&key={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<LatLng>> {
        let response = self.client.get(self.request_url(query)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Geocoding(format!("geocoding API returned {status}")));
        }

        let location = parse_geocode(&response.text().await?)?;
        tracing::debug!(query, found = location.is_some(), "geocoded destination");
        Ok(location)
    }
}
