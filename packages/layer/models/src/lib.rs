#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map layer and data source definition types.
//!
//! Defines the TOML schema for a logical map layer (zoning, parcels,
//! flood hazard, buildings, ...) together with the ordered list of
//! places its `GeoJSON` can be fetched from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical map layer, deserialized from TOML.
///
/// The `sources` list is a priority order: the loader tries each entry
/// in turn and keeps the first one that yields usable data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Unique layer identifier (e.g., `"zoning"`).
    pub id: String,
    /// Human-readable name (e.g., "Zoning Districts").
    pub name: String,
    /// Minimum number of features a source must return to be accepted.
    #[serde(default = "default_min_features")]
    pub min_features: usize,
    /// Whether the layer starts out visible.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Whether this layer's extent drives the initial fit-to-bounds.
    #[serde(default)]
    pub fit_bounds: bool,
    /// Height defaulting for building footprints. Only set on building
    /// layers.
    #[serde(default)]
    pub buildings: Option<BuildingHeights>,
    /// Candidate data origins, most preferred first.
    pub sources: Vec<SourceSpec>,
}

impl LayerDefinition {
    /// Returns the layer identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

const fn default_min_features() -> usize {
    1
}

const fn default_true() -> bool {
    true
}

/// Where a layer's `GeoJSON` can be fetched from.
///
/// Each variant corresponds to a different kind of origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    /// A `GeoJSON` file on local disk, relative to the data directory.
    LocalFile {
        /// Path to the file.
        path: String,
    },
    /// Direct `GeoJSON` URL (static hosting or any API returning a
    /// `FeatureCollection`).
    GeojsonUrl {
        /// Full URL that returns a `GeoJSON` `FeatureCollection`.
        url: String,
    },
    /// `ArcGIS` `FeatureServer` or `MapServer` layer.
    ///
    /// Queried via `{url}/query?...&outSR=4326&f=geojson`.
    Arcgis {
        /// Layer URL (up to the layer index, without `/query`).
        url: String,
        /// SQL `where` clause (default: `1=1`).
        #[serde(rename = "where", default = "default_where")]
        where_clause: String,
        /// Attribute fields to return. Empty means all (`*`).
        #[serde(default)]
        out_fields: Vec<String>,
        /// Restrict the query to the current view extent.
        #[serde(default)]
        clip_to_view: bool,
        /// Page size for follow-up pages once the server reports a
        /// transfer limit (default: 1000).
        max_records: Option<u32>,
    },
    /// `OpenStreetMap` Overpass interpreter.
    ///
    /// The query must use `out geom` so ways carry inline coordinates.
    Overpass {
        /// Interpreter URL (e.g., `"https://overpass-api.de/api/interpreter"`).
        url: String,
        /// Overpass QL query.
        query: String,
    },
}

fn default_where() -> String {
    "1=1".to_string()
}

impl SourceSpec {
    /// Short name of the source kind, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LocalFile { .. } => "local file",
            Self::GeojsonUrl { .. } => "GeoJSON URL",
            Self::Arcgis { .. } => "ArcGIS",
            Self::Overpass { .. } => "Overpass",
        }
    }

    /// The path or URL this source reads from.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::LocalFile { path } => path,
            Self::GeojsonUrl { url } | Self::Arcgis { url, .. } | Self::Overpass { url, .. } => {
                url
            }
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.location())
    }
}

/// How to fill in a numeric height for building footprints that lack
/// one.
///
/// Height is taken from `height_property` if present, otherwise
/// `meters_per_level` times the first level count found in
/// `level_properties`, otherwise `meters_per_level * default_levels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingHeights {
    /// Property holding an explicit height in meters.
    #[serde(default = "default_height_property")]
    pub height_property: String,
    /// Properties holding a level count, checked in order.
    #[serde(default = "default_level_properties")]
    pub level_properties: Vec<String>,
    /// Meters per building level.
    #[serde(default = "default_meters_per_level")]
    pub meters_per_level: f64,
    /// Level count assumed when nothing is known.
    #[serde(default = "default_levels")]
    pub default_levels: f64,
}

impl BuildingHeights {
    /// Height used for buildings with no height or level information.
    #[must_use]
    pub fn default_height_m(&self) -> f64 {
        self.meters_per_level * self.default_levels
    }
}

impl Default for BuildingHeights {
    fn default() -> Self {
        Self {
            height_property: default_height_property(),
            level_properties: default_level_properties(),
            meters_per_level: default_meters_per_level(),
            default_levels: default_levels(),
        }
    }
}

fn default_height_property() -> String {
    "height_m".to_string()
}

fn default_level_properties() -> Vec<String> {
    vec!["levels".to_string(), "building:levels".to_string()]
}

const fn default_meters_per_level() -> f64 {
    3.0
}

const fn default_levels() -> f64 {
    2.0
}

/// A layer configuration file: an optional initial view extent plus
/// the layers to load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Initial view as `[[west, south], [east, north]]`, used by sources
    /// with `clip_to_view`.
    #[serde(default)]
    pub view_extent: Option<[[f64; 2]; 2]>,
    /// Layer definitions.
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layer_with_fallback_chain() {
        let layer: LayerDefinition = toml::de::from_str(
            r#"
            id = "parcels"
            name = "Parcels"
            min_features = 10

            [[sources]]
            type = "local_file"
            path = "parcels/windsor_parcels.geojson"

            [[sources]]
            type = "arcgis"
            url = "https://example.com/arcgis/rest/services/Parcels/FeatureServer/0"
            where = "UPPER(TNAME) = 'WINDSOR'"
            out_fields = ["PARCID", "OWNER1"]
            "#,
        )
        .unwrap();

        assert_eq!(layer.id(), "parcels");
        assert_eq!(layer.min_features, 10);
        assert!(layer.visible);
        assert!(!layer.fit_bounds);
        assert!(layer.buildings.is_none());
        assert_eq!(layer.sources.len(), 2);
        assert_eq!(
            layer.sources[0],
            SourceSpec::LocalFile {
                path: "parcels/windsor_parcels.geojson".to_string()
            }
        );
        match &layer.sources[1] {
            SourceSpec::Arcgis {
                where_clause,
                out_fields,
                clip_to_view,
                max_records,
                ..
            } => {
                assert_eq!(where_clause, "UPPER(TNAME) = 'WINDSOR'");
                assert_eq!(out_fields, &["PARCID", "OWNER1"]);
                assert!(!clip_to_view);
                assert!(max_records.is_none());
            }
            other => panic!("expected arcgis source, got {other:?}"),
        }
    }

    #[test]
    fn arcgis_where_defaults_to_all() {
        let source: SourceSpec = toml::de::from_str(
            r#"
            type = "arcgis"
            url = "https://example.com/MapServer/57"
            "#,
        )
        .unwrap();
        assert!(matches!(
            source,
            SourceSpec::Arcgis { ref where_clause, .. } if where_clause == "1=1"
        ));
    }

    #[test]
    fn building_heights_defaults() {
        let heights: BuildingHeights = toml::de::from_str("").unwrap();
        assert_eq!(heights, BuildingHeights::default());
        assert!((heights.default_height_m() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn source_display() {
        let source = SourceSpec::GeojsonUrl {
            url: "https://example.com/zoning.geojson".to_string(),
        };
        assert_eq!(
            source.to_string(),
            "GeoJSON URL https://example.com/zoning.geojson"
        );
    }
}
