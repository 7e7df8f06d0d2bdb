//! Fetcher dispatch and implementations for different source types.
//!
//! Each fetcher returns the raw JSON of a `GeoJSON` `FeatureCollection`.
//! Validation and feature counting happen in the [`crate::loader`], so a
//! fetcher only has to get the bytes and, for non-`GeoJSON` APIs, reshape
//! them.

pub mod arcgis;
pub mod geojson_url;
pub mod local_file;
pub mod overpass;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use town_viewer_extent::BoundingBox;
use town_viewer_layer_models::SourceSpec;

use crate::{FetchError, LayerError};

/// Default per-source timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves the payload for a single source.
///
/// The loader only talks to sources through this trait, which keeps the
/// fallback logic independent of HTTP and the filesystem.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches the source and returns its payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the source cannot be retrieved or its
    /// payload cannot be read as JSON.
    async fn fetch(&self, source: &SourceSpec) -> Result<serde_json::Value, FetchError>;
}

/// Fetches sources over HTTP and from the local data directory.
pub struct HttpFetcher {
    client: reqwest::Client,
    data_dir: PathBuf,
    timeout: Duration,
    view_extent: Option<BoundingBox>,
}

impl HttpFetcher {
    /// Creates a fetcher with its own `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Http`] if the HTTP client cannot be built.
    pub fn new(data_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, LayerError> {
        let client = reqwest::Client::builder()
            .user_agent("town-viewer/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, data_dir, timeout))
    }

    /// Creates a fetcher around an existing client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        data_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            data_dir: data_dir.into(),
            timeout,
            view_extent: None,
        }
    }

    /// Sets the view extent used by sources with `clip_to_view`.
    #[must_use]
    pub fn with_view_extent(mut self, extent: Option<BoundingBox>) -> Self {
        self.view_extent = extent;
        self
    }

    async fn dispatch(&self, source: &SourceSpec) -> Result<serde_json::Value, FetchError> {
        match source {
            SourceSpec::LocalFile { path } => local_file::fetch(&self.data_dir, path).await,
            SourceSpec::GeojsonUrl { url } => geojson_url::fetch(&self.client, url).await,
            SourceSpec::Arcgis {
                url,
                where_clause,
                out_fields,
                clip_to_view,
                max_records,
            } => {
                let query = arcgis::ArcgisQuery {
                    where_clause,
                    out_fields,
                    envelope: if *clip_to_view {
                        self.view_extent
                    } else {
                        None
                    },
                    max_records: *max_records,
                };
                arcgis::fetch(&self.client, url, &query).await
            }
            SourceSpec::Overpass { url, query } => {
                overpass::fetch(&self.client, url, query).await
            }
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceSpec) -> Result<serde_json::Value, FetchError> {
        // The client timeout covers single requests; this bounds paginated
        // queries and local reads too.
        tokio::time::timeout(self.timeout, self.dispatch(source))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Transfer {
                    message: format!("timed out after {:?}", self.timeout),
                })
            })
    }
}
