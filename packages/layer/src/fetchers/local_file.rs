//! Local static file fetcher.
//!
//! Reads a `GeoJSON` file from the viewer's data directory. This is the
//! cheapest and most reliable origin, so layer definitions usually list
//! it first.

use std::path::Path;

use crate::FetchError;

/// Reads and parses a `GeoJSON` file.
///
/// Relative paths are resolved against `data_dir`.
///
/// # Errors
///
/// Returns [`FetchError::Transfer`] if the file cannot be read and
/// [`FetchError::Decode`] if it is not valid JSON.
pub async fn fetch(data_dir: &Path, path: &str) -> Result<serde_json::Value, FetchError> {
    let full_path = data_dir.join(path);
    log::debug!("  reading {}", full_path.display());

    let body = tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|e| FetchError::Transfer {
            message: format!("Failed to read {}: {e}", full_path.display()),
        })?;

    serde_json::from_str(&body).map_err(|e| FetchError::Decode {
        message: format!("Failed to parse {}: {e}", full_path.display()),
    })
}
