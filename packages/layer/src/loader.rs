//! Prioritized source loading for a single layer.
//!
//! Sources are tried strictly one after another, most preferred first.
//! The first source whose payload is a well-formed `FeatureCollection`
//! with at least `min_features` features wins, and later sources are
//! never requested. A rejected source is logged and recorded; only when
//! every source has been rejected does the caller get an error.

use geojson::FeatureCollection;
use town_viewer_layer_models::{LayerDefinition, SourceSpec};

use crate::fetchers::SourceFetcher;
use crate::{FetchError, LayerError, SourceAttempt};

/// A layer whose data was obtained from one of its sources.
#[derive(Debug, Clone)]
pub struct LoadedLayer {
    /// Layer identifier.
    pub id: String,
    /// Position of the winning source in the priority list.
    pub source_index: usize,
    /// The winning source.
    pub source: SourceSpec,
    /// The decoded features.
    pub collection: FeatureCollection,
}

impl LoadedLayer {
    /// Number of features in the layer.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.collection.features.len()
    }

    /// Returns `true` if a fallback source was used rather than the
    /// preferred one.
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.source_index > 0
    }
}

/// Loads a layer from the first viable source in its priority list.
///
/// # Errors
///
/// Returns [`LayerError::Config`] if the layer has no sources, and
/// [`LayerError::AllSourcesExhausted`] with the per-source failure log if
/// no source produced a usable `FeatureCollection`.
pub async fn load_layer(
    fetcher: &dyn SourceFetcher,
    layer: &LayerDefinition,
) -> Result<LoadedLayer, LayerError> {
    if layer.sources.is_empty() {
        return Err(LayerError::Config {
            message: format!("Layer '{}' has no sources", layer.id),
        });
    }

    let total = layer.sources.len();
    let mut attempts = Vec::new();

    for (index, source) in layer.sources.iter().enumerate() {
        log::info!(
            "{}: trying source {}/{total}: {source}",
            layer.id,
            index + 1
        );

        match try_source(fetcher, source, layer.min_features).await {
            Ok(collection) => {
                log::info!(
                    "{}: loaded {} features from {source}",
                    layer.id,
                    collection.features.len()
                );
                return Ok(LoadedLayer {
                    id: layer.id.clone(),
                    source_index: index,
                    source: source.clone(),
                    collection,
                });
            }
            Err(error) => {
                log::warn!(
                    "{}: source {}/{total} rejected ({}): {error}",
                    layer.id,
                    index + 1,
                    error.kind()
                );
                attempts.push(SourceAttempt {
                    index,
                    source: source.to_string(),
                    error,
                });
            }
        }
    }

    log::error!("{}: all {total} source(s) failed", layer.id);

    Err(LayerError::AllSourcesExhausted {
        layer: layer.id.clone(),
        attempts,
    })
}

/// Fetches one source and checks that its payload is usable.
async fn try_source(
    fetcher: &dyn SourceFetcher,
    source: &SourceSpec,
    min_features: usize,
) -> Result<FeatureCollection, FetchError> {
    let payload = fetcher.fetch(source).await?;
    let collection = decode_collection(payload)?;

    let found = collection.features.len();
    // A zero threshold would accept empty layers; one feature is the floor.
    let required = min_features.max(1);
    if found < required {
        return Err(FetchError::EmptyResult { found, required });
    }

    Ok(collection)
}

/// Decodes a JSON payload as a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// Returns [`FetchError::Decode`] if the payload is not a structurally
/// valid `FeatureCollection`.
pub fn decode_collection(payload: serde_json::Value) -> Result<FeatureCollection, FetchError> {
    match payload.get("type").and_then(serde_json::Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => {
            return Err(FetchError::Decode {
                message: format!("Expected a FeatureCollection, got type '{other}'"),
            });
        }
        None => {
            return Err(FetchError::Decode {
                message: "Payload has no GeoJSON type".to_string(),
            });
        }
    }

    FeatureCollection::try_from(payload).map_err(|e| FetchError::Decode {
        message: format!("Invalid FeatureCollection: {e}"),
    })
}
