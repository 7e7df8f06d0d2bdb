//! The consumer side of layer loading.
//!
//! A [`LayerSink`] is whatever displays the layers: a map widget, or a
//! writer that stores them for a static page. Loaders never reach for a
//! shared map instance; the sink is always passed in explicitly.

use geojson::FeatureCollection;
use town_viewer_extent::BoundingBox;

/// Receives loaded layers and view instructions.
pub trait LayerSink {
    /// Error type for sink operations.
    type Error: std::error::Error;

    /// Adds a named data layer.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the layer cannot be added.
    fn add_layer(
        &mut self,
        id: &str,
        name: &str,
        collection: &FeatureCollection,
    ) -> Result<(), Self::Error>;

    /// Shows or hides a previously added layer.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the visibility cannot be changed.
    fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), Self::Error>;

    /// Fits the view to the given extent.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the view cannot be changed.
    fn fit_bounds(&mut self, bounds: &BoundingBox) -> Result<(), Self::Error>;
}
