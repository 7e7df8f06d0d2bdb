#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map layer loading with prioritized source fallback.
//!
//! Each logical layer (zoning, parcels, flood hazard, buildings) has an
//! ordered list of places its `GeoJSON` can come from: usually a local
//! static file first, then a live `ArcGIS` or Overpass query. The
//! [`loader`] walks that list one source at a time and keeps the first
//! usable `FeatureCollection`, so callers never see an unreliable
//! third-party service directly. The [`viewer`] loads every layer and
//! hands the results to a [`sink::LayerSink`] such as a map widget.

pub mod fetchers;
pub mod heights;
pub mod http;
pub mod loader;
pub mod registry;
pub mod sink;
pub mod viewer;

use std::fmt;

use thiserror::Error;

/// Why a single source attempt was rejected.
///
/// These never escape the loader on their own: a failed source is
/// logged and the next one is tried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, timeout, non-success HTTP status, or an
    /// unreadable local file.
    #[error("Transfer failed: {message}")]
    Transfer {
        /// Description of what went wrong.
        message: String,
    },

    /// The payload was not JSON, or not a `GeoJSON` `FeatureCollection`.
    #[error("Decode failed: {message}")]
    Decode {
        /// Description of what went wrong.
        message: String,
    },

    /// The payload was valid but held too few features.
    #[error("Too few features: found {found}, need at least {required}")]
    EmptyResult {
        /// Number of features returned.
        found: usize,
        /// Minimum accepted.
        required: usize,
    },
}

impl FetchError {
    /// Short name of the failure class, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Decode { .. } => "decode",
            Self::EmptyResult { .. } => "empty",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            e.to_string()
        };
        Self::Transfer { message }
    }
}

/// One rejected source in a layer's fallback chain.
#[derive(Debug)]
pub struct SourceAttempt {
    /// Position of the source in the priority list.
    pub index: usize,
    /// Human-readable source description.
    pub source: String,
    /// Why it was rejected.
    pub error: FetchError,
}

impl fmt::Display for SourceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index + 1, self.source, self.error)
    }
}

/// Errors that can occur during layer operations.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Every source in the layer's fallback chain failed.
    #[error("No data available for layer '{layer}': all {} source(s) failed", .attempts.len())]
    AllSourcesExhausted {
        /// Layer identifier.
        layer: String,
        /// Each rejected source, in the order tried.
        attempts: Vec<SourceAttempt>,
    },

    /// A layer definition is unusable.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error reading a layer configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP client construction failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
