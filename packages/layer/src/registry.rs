//! Compile-time registry of map layer definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a new layer requires creating a TOML file in `layers/` and
//! adding a corresponding entry here. A [`LayerConfig`] file on disk can
//! replace the embedded set entirely.

use std::path::Path;

use town_viewer_extent::BoundingBox;
use town_viewer_layer_models::{LayerConfig, LayerDefinition};

use crate::LayerError;

/// Number of registered layers. Updated when new layers are added.
/// Enforced by a test.
#[cfg(test)]
const EXPECTED_LAYER_COUNT: usize = 5;

/// Embedded TOML layer definitions, in draw order.
const LAYER_TOMLS: &[(&str, &str)] = &[
    ("buildings", include_str!("../layers/buildings.toml")),
    ("zoning", include_str!("../layers/zoning.toml")),
    ("zoning_overlay", include_str!("../layers/zoning_overlay.toml")),
    ("parcels", include_str!("../layers/parcels.toml")),
    ("flood", include_str!("../layers/flood.toml")),
];

/// Initial view around the Town of Windsor, VT.
pub const DEFAULT_VIEW_EXTENT: BoundingBox = BoundingBox {
    sw_lon: -72.425,
    sw_lat: 43.455,
    ne_lon: -72.345,
    ne_lat: 43.505,
};

/// Returns all registered layers.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the tests below.
#[must_use]
pub fn all_layers() -> Vec<LayerDefinition> {
    LAYER_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse layer definition '{name}': {e}"))
        })
        .collect()
}

/// Returns the built-in configuration: every registered layer and the
/// default view extent.
#[must_use]
pub fn default_config() -> LayerConfig {
    LayerConfig {
        view_extent: Some(DEFAULT_VIEW_EXTENT.to_array()),
        layers: all_layers(),
    }
}

/// Parses a layer configuration from TOML text and validates every
/// layer in it.
///
/// # Errors
///
/// Returns [`LayerError::Toml`] if the text is not a valid configuration
/// and [`LayerError::Config`] if a layer definition is unusable.
pub fn parse_config(toml_str: &str) -> Result<LayerConfig, LayerError> {
    let config: LayerConfig = toml::de::from_str(toml_str)?;
    if config.layers.is_empty() {
        return Err(LayerError::Config {
            message: "Configuration defines no layers".to_string(),
        });
    }
    for layer in &config.layers {
        validate_layer(layer)?;
    }
    Ok(config)
}

/// Reads a layer configuration file.
///
/// # Errors
///
/// Returns [`LayerError`] if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<LayerConfig, LayerError> {
    log::info!("Loading layer configuration from {}", path.display());
    let toml_str = std::fs::read_to_string(path)?;
    parse_config(&toml_str)
}

/// Checks that a layer definition can be loaded.
///
/// # Errors
///
/// Returns [`LayerError::Config`] if the layer has an empty id or no
/// sources.
pub fn validate_layer(layer: &LayerDefinition) -> Result<(), LayerError> {
    if layer.id.trim().is_empty() {
        return Err(LayerError::Config {
            message: format!("Layer '{}' has an empty id", layer.name),
        });
    }
    if layer.sources.is_empty() {
        return Err(LayerError::Config {
            message: format!("Layer '{}' has no sources", layer.id),
        });
    }
    Ok(())
}

/// Keeps only the layers whose ids appear in `ids`, preserving the
/// configured order. Unknown ids are logged and ignored.
#[must_use]
pub fn select_layers(layers: Vec<LayerDefinition>, ids: &[&str]) -> Vec<LayerDefinition> {
    for id in ids {
        if !layers.iter().any(|layer| layer.id() == *id) {
            log::warn!("Unknown layer '{id}' requested, ignoring");
        }
    }
    layers
        .into_iter()
        .filter(|layer| ids.contains(&layer.id()))
        .collect()
}
