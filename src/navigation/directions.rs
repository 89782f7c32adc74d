//! Directions API client and response parsing

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::geo::LatLng;
use crate::polyline;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new("<[^>]*>").expect("valid regex"));

/// One leg of spoken guidance
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    /// Plain-text instruction
    pub instruction: String,
    /// Step geometry; never empty
    pub polyline_points: Vec<LatLng>,
}

impl RouteStep {
    /// Point whose proximity triggers this step's instruction
    #[must_use]
    pub fn end_point(&self) -> Option<LatLng> {
        self.polyline_points.last().copied()
    }
}

/// A fetched route; `steps` is never empty
#[derive(Debug, Clone, PartialEq)]
pub struct Directions {
    /// Human-readable duration, e.g. "14 mins"
    pub eta: String,
    pub steps: Vec<RouteStep>,
    pub overview_polyline: Vec<LatLng>,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    status: Option<String>,
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    legs: Vec<ApiLeg>,
    overview_polyline: ApiPolyline,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    duration: ApiText,
    steps: Vec<ApiStep>,
}

#[derive(Debug, Deserialize)]
struct ApiText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiStep {
    html_instructions: String,
    polyline: ApiPolyline,
}

#[derive(Debug, Deserialize)]
struct ApiPolyline {
    points: String,
}

/// Remove HTML tags from an instruction
#[must_use]
pub fn strip_html_tags(html: &str) -> String {
    HTML_TAG.replace_all(html, "").into_owned()
}

/// Parse a directions response body
///
/// Returns `Ok(None)` when the response holds no usable route: no routes,
/// or no step with any geometry.
///
/// # Errors
///
/// Returns error if the body is not a directions document or a polyline is
/// malformed
pub fn parse_directions(body: &str) -> Result<Option<Directions>> {
    let response: DirectionsResponse = serde_json::from_str(body)?;

    let Some(route) = response.routes.into_iter().next() else {
        tracing::debug!(status = ?response.status, "no route in directions response");
        return Ok(None);
    };
    let leg = route
        .legs
        .into_iter()
        .next()
        .ok_or_else(|| Error::Directions("route has no legs".to_string()))?;

    let mut steps = Vec::with_capacity(leg.steps.len());
    for step in leg.steps {
        let polyline_points = polyline::decode(&step.polyline.points)?;
        if polyline_points.is_empty() {
            tracing::debug!(
                instruction = %step.html_instructions,
                "dropping step without geometry"
            );
            continue;
        }
        steps.push(RouteStep {
            instruction: strip_html_tags(&step.html_instructions),
            polyline_points,
        });
    }

    if steps.is_empty() {
        return Ok(None);
    }

    Ok(Some(Directions {
        eta: leg.duration.text,
        steps,
        overview_polyline: polyline::decode(&route.overview_polyline.points)?,
    }))
}

/// Source of routes between two points
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Fetch a route; `Ok(None)` means no route exists
    async fn fetch(&self, origin: LatLng, destination: LatLng) -> Result<Option<Directions>>;
}

/// Google Directions API client
pub struct DirectionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DirectionsClient {
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

    /// Request URL for a route
    #[must_use]
    pub fn request_url(&self, origin: LatLng, destination: LatLng) -> String {
        format!(
            "{}/maps/api/directions/json?origin={}&destination={}&key={}",
            self.base_url,
            origin.to_query(),
            destination.to_query(),
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl DirectionsProvider for DirectionsClient {
    async fn fetch(&self, origin: LatLng, destination: LatLng) -> Result<Option<Directions>> {
        tracing::debug!(%origin, %destination, "fetching directions");

        let response = self
            .client
            .get(self.request_url(origin, destination))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Directions(format!("directions API returned {status}")));
        }

        let body = response.text().await?;
        let directions = parse_directions(&body)?;
        if let Some(d) = &directions {
            tracing::info!(steps = d.steps.len(), eta = %d.eta, "route fetched");
        }
        Ok(directions)
    }
}
