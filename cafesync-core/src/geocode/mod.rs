//! Address geocoding against a GeoJSON-style address search endpoint.
//!
//! The default endpoint is the GSI address search, which answers a query
//! string with an array of features whose `geometry.coordinates` are
//! `[lng, lat]`.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{CafeError, GeocodeError};
use crate::throttle::Throttle;
use crate::types::Coordinates;

/// Leading Japanese postal code: optional `〒`, 3 digits, optional hyphen,
/// 4 digits, trailing whitespace.
static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*〒?\s*[0-9０-９]{3}[-‐－ー]?[0-9０-９]{4}\s*").expect("valid postal code regex")
});

/// Strip a leading postal code token and surrounding whitespace.
pub fn clean_address(address: &str) -> String {
    POSTAL_CODE.replace(address, "").trim().to_string()
}

/// Resolves a postal address to coordinates.
///
/// `Ok(None)` means "not found", including empty or malformed answers.
/// `Err` is reserved for transport failures.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;

    async fn geocode(&self, address: &str) -> crate::error::Result<Option<Coordinates>>;
}

/// Geocoder for GSI-compatible address search endpoints.
#[derive(Debug)]
pub struct GsiGeocoder {
    client: Client,
    endpoint: String,
    throttle: Throttle,
}

impl GsiGeocoder {
    pub fn new(endpoint: impl Into<String>, throttle: Throttle) -> Self {
        Self {
            client: crate::http::client(),
            endpoint: endpoint.into(),
            throttle,
        }
    }

    /// Full request URL for an already-cleaned address.
    pub fn request_url(&self, cleaned: &str) -> String {
        format!("{}?q={}", self.endpoint, urlencoding::encode(cleaned))
    }
}

#[derive(Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

/// Read the first feature's `[lng, lat]` pair from a response body.
pub fn parse_features(body: &str) -> Option<Coordinates> {
    let features: Vec<Feature> = serde_json::from_str(body).ok()?;
    let first = features.first()?;
    let (lng, lat) = match first.geometry.coordinates.as_slice() {
        [lng, lat, ..] => (*lng, *lat),
        _ => return None,
    };
    (lat.is_finite() && lng.is_finite()).then_some(Coordinates { lat, lng })
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl Geocoder for GsiGeocoder {
    fn name(&self) -> &str {
        "gsi"
    }

    #[instrument(skip(self), name = "geocode")]
    async fn geocode(&self, address: &str) -> crate::error::Result<Option<Coordinates>> {
        let cleaned = clean_address(address);
        if cleaned.is_empty() {
            debug!("Address empty after cleaning");
            return Ok(None);
        }

        self.throttle.wait().await;

        let url = self.request_url(&cleaned);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CafeError::Geocode(GeocodeError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CafeError::Geocode(GeocodeError::ApiError { status, body }));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CafeError::Geocode(GeocodeError::Network(e.to_string())))?;

        let coords = parse_features(&body);
        if coords.is_none() {
            debug!(%cleaned, "No coordinates in geocoder response");
        }
        Ok(coords)
    }
}
