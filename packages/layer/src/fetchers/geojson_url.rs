//! Direct `GeoJSON` URL fetcher.
//!
//! Fetches a standard `GeoJSON` `FeatureCollection` from any URL that
//! returns it directly.

use crate::{FetchError, http};

/// Fetches a `GeoJSON` document from a URL.
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails or the response cannot
/// be parsed.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<serde_json::Value, FetchError> {
    log::debug!("  GET {url}");
    http::send_json(client.get(url)).await
}
