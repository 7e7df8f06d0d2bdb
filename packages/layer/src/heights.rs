//! Building height defaulting for 3D extrusion.
//!
//! Footprints from local surveys carry an explicit `height_m`, while
//! `OpenStreetMap` footprints usually only have a level count, or
//! nothing at all. Every feature gets a numeric height so renderers can
//! extrude it without their own fallback rules.

use geojson::FeatureCollection;
use town_viewer_layer_models::BuildingHeights;

/// Resolves a building's height in meters from its properties.
///
/// Uses the explicit height property if it is a non-negative number (or
/// a numeric string), otherwise the first positive level-count property times
/// `meters_per_level`, otherwise the configured default.
#[must_use]
pub fn resolve_height(
    properties: Option<&serde_json::Map<String, serde_json::Value>>,
    settings: &BuildingHeights,
) -> f64 {
    known_height(properties, settings).unwrap_or_else(|| settings.default_height_m())
}

/// Height derived from the feature's own properties, if any.
fn known_height(
    properties: Option<&serde_json::Map<String, serde_json::Value>>,
    settings: &BuildingHeights,
) -> Option<f64> {
    let properties = properties?;

    if let Some(height) = properties
        .get(&settings.height_property)
        .and_then(as_number)
        .filter(|height| *height >= 0.0)
    {
        return Some(height);
    }

    settings
        .level_properties
        .iter()
        .find_map(|key| {
            properties
                .get(key)
                .and_then(as_number)
                .filter(|levels| *levels > 0.0)
        })
        .map(|levels| levels * settings.meters_per_level)
}

/// Writes a resolved numeric height into every feature's properties.
///
/// Returns the number of features that fell back to the default height.
pub fn apply_building_heights(
    collection: &mut FeatureCollection,
    settings: &BuildingHeights,
) -> usize {
    let default_height = settings.default_height_m();
    let mut defaulted = 0;

    for feature in &mut collection.features {
        let height = known_height(feature.properties.as_ref(), settings).unwrap_or_else(|| {
            defaulted += 1;
            default_height
        });
        feature
            .properties
            .get_or_insert_with(serde_json::Map::new)
            .insert(settings.height_property.clone(), height.into());
    }

    if defaulted > 0 {
        log::debug!(
            "{defaulted}/{} buildings use the default height of {default_height} m",
            collection.features.len()
        );
    }

    defaulted
}

/// Reads a finite number from a JSON number or numeric string.
fn as_number(value: &serde_json::Value) -> Option<f64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
