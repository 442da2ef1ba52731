//! Geocoding provider boundary.
//!
//! The resolver only sees the [`Geocoder`] trait; [`NominatimClient`] is the
//! production implementation backed by the Nominatim search API.

mod client;

pub use client::NominatimClient;

use async_trait::async_trait;

use crate::error::GeocodeResult;

/// A provider search result as received, before memo normalization.
pub type RawLocation = serde_json::Map<String, serde_json::Value>;

/// Free-text geocoding, performed on behalf of one user agent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve `query` to the best matching place, or `None` when the provider
    /// has no match.
    async fn geocode(&self, query: &str, user_agent: &str) -> GeocodeResult<Option<RawLocation>>;
}
