#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Extent calculation for `GeoJSON` layers.
//!
//! Computes the tightest longitude/latitude box around every polygon
//! vertex of one or more `FeatureCollection`s, for "zoom to fit" on the
//! map. Points, lines and features without geometry do not contribute.
//! An input with no polygon vertices has no bounds, and callers skip the
//! fit step in that case.

use geojson::{FeatureCollection, PolygonType, Position, Value};
use serde::{Deserialize, Serialize};

/// Spatial reference id for WGS84 longitude/latitude.
pub const WGS84_WKID: u32 = 4326;

/// An axis-aligned longitude/latitude box given by its southwest and
/// northeast corners.
///
/// Always satisfies `sw_lon <= ne_lon` and `sw_lat <= ne_lat`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge (minimum longitude).
    pub sw_lon: f64,
    /// Southern edge (minimum latitude).
    pub sw_lat: f64,
    /// Eastern edge (maximum longitude).
    pub ne_lon: f64,
    /// Northern edge (maximum latitude).
    pub ne_lat: f64,
}

impl BoundingBox {
    /// Creates a box from two opposite corners given in any order.
    #[must_use]
    pub fn new(a: [f64; 2], b: [f64; 2]) -> Self {
        Self {
            sw_lon: a[0].min(b[0]),
            sw_lat: a[1].min(b[1]),
            ne_lon: a[0].max(b[0]),
            ne_lat: a[1].max(b[1]),
        }
    }

    /// Creates a zero-area box around a single point.
    #[must_use]
    pub const fn from_point(lon: f64, lat: f64) -> Self {
        Self {
            sw_lon: lon,
            sw_lat: lat,
            ne_lon: lon,
            ne_lat: lat,
        }
    }

    /// Grows the box to include the given point.
    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.sw_lon = self.sw_lon.min(lon);
        self.sw_lat = self.sw_lat.min(lat);
        self.ne_lon = self.ne_lon.max(lon);
        self.ne_lat = self.ne_lat.max(lat);
    }

    /// Returns the smallest box containing both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            sw_lon: self.sw_lon.min(other.sw_lon),
            sw_lat: self.sw_lat.min(other.sw_lat),
            ne_lon: self.ne_lon.max(other.ne_lon),
            ne_lat: self.ne_lat.max(other.ne_lat),
        }
    }

    /// Returns `true` if the point lies inside or on the edge of the box.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.sw_lon..=self.ne_lon).contains(&lon) && (self.sw_lat..=self.ne_lat).contains(&lat)
    }

    /// Center point as `[lon, lat]`.
    #[must_use]
    pub fn center(&self) -> [f64; 2] {
        [
            (self.sw_lon + self.ne_lon) / 2.0,
            (self.sw_lat + self.ne_lat) / 2.0,
        ]
    }

    /// East-west extent in degrees.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.ne_lon - self.sw_lon
    }

    /// North-south extent in degrees.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.ne_lat - self.sw_lat
    }

    /// Returns a copy grown by `degrees` on every side, clamped to the
    /// valid longitude/latitude range.
    #[must_use]
    pub fn padded(&self, degrees: f64) -> Self {
        Self {
            sw_lon: (self.sw_lon - degrees).max(-180.0),
            sw_lat: (self.sw_lat - degrees).max(-90.0),
            ne_lon: (self.ne_lon + degrees).min(180.0),
            ne_lat: (self.ne_lat + degrees).min(90.0),
        }
    }

    /// Corner pairs as `[[sw_lon, sw_lat], [ne_lon, ne_lat]]`, the shape
    /// map widgets take for fit-to-bounds calls.
    #[must_use]
    pub const fn to_array(&self) -> [[f64; 2]; 2] {
        [[self.sw_lon, self.sw_lat], [self.ne_lon, self.ne_lat]]
    }

    /// Esri envelope JSON for `geometryType=esriGeometryEnvelope`
    /// spatial filters.
    #[must_use]
    pub fn to_esri_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "xmin": self.sw_lon,
            "ymin": self.sw_lat,
            "xmax": self.ne_lon,
            "ymax": self.ne_lat,
            "spatialReference": { "wkid": WGS84_WKID },
        })
    }
}

impl From<BoundingBox> for geo::Rect<f64> {
    fn from(bbox: BoundingBox) -> Self {
        Self::new(
            geo::Coord {
                x: bbox.sw_lon,
                y: bbox.sw_lat,
            },
            geo::Coord {
                x: bbox.ne_lon,
                y: bbox.ne_lat,
            },
        )
    }
}

impl From<geo::Rect<f64>> for BoundingBox {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    }
}

/// Running min/max over lon/lat positions.
///
/// Starts from infinite sentinels so any finite vertex replaces them.
struct ExtentAccumulator {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl ExtentAccumulator {
    const fn new() -> Self {
        Self {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        }
    }

    fn add_position(&mut self, position: &Position) {
        // Positions need at least lon and lat; anything shorter is malformed.
        let [lon, lat, ..] = position.as_slice() else {
            return;
        };
        self.min_lon = self.min_lon.min(*lon);
        self.max_lon = self.max_lon.max(*lon);
        self.min_lat = self.min_lat.min(*lat);
        self.max_lat = self.max_lat.max(*lat);
    }

    fn add_polygon(&mut self, polygon: &PolygonType) {
        for position in polygon.iter().flatten() {
            self.add_position(position);
        }
    }

    fn add_collection(&mut self, collection: &FeatureCollection) {
        for feature in &collection.features {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            match &geometry.value {
                Value::Polygon(polygon) => self.add_polygon(polygon),
                Value::MultiPolygon(polygons) => {
                    for polygon in polygons {
                        self.add_polygon(polygon);
                    }
                }
                _ => {}
            }
        }
    }

    fn finish(self) -> Option<BoundingBox> {
        if self.min_lon.is_infinite() {
            return None;
        }
        Some(BoundingBox {
            sw_lon: self.min_lon,
            sw_lat: self.min_lat,
            ne_lon: self.max_lon,
            ne_lat: self.max_lat,
        })
    }
}

/// Computes the bounding box of every Polygon and `MultiPolygon` vertex
/// in the collection.
///
/// Returns `None` when the collection has no features or none of them
/// carry polygon coordinates.
#[must_use]
pub fn feature_collection_bbox(collection: &FeatureCollection) -> Option<BoundingBox> {
    let mut acc = ExtentAccumulator::new();
    acc.add_collection(collection);
    acc.finish()
}

/// Computes the combined bounding box of several collections.
///
/// Collections without polygon vertices are ignored. Returns `None` if
/// none of them contribute.
#[must_use]
pub fn collections_bbox<'a, I>(collections: I) -> Option<BoundingBox>
where
    I: IntoIterator<Item = &'a FeatureCollection>,
{
    let mut acc = ExtentAccumulator::new();
    for collection in collections {
        acc.add_collection(collection);
    }
    acc.finish()
}
