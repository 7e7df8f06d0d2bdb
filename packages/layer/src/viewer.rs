//! Loads a set of layers and presents them on a [`LayerSink`].
//!
//! Layers are independent, so they load concurrently; each one still
//! walks its own source list strictly in order. A layer whose sources
//! all fail is left off the map and reported, and the rest of the view
//! is built as usual.

use futures::future::join_all;
use serde::Serialize;
use town_viewer_extent::{BoundingBox, collections_bbox, feature_collection_bbox};
use town_viewer_layer_models::LayerDefinition;

use crate::fetchers::SourceFetcher;
use crate::heights::apply_building_heights;
use crate::loader::{LoadedLayer, load_layer};
use crate::sink::LayerSink;

/// A layer that made it onto the map.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    /// Layer identifier.
    pub id: String,
    /// Human-readable layer name.
    pub name: String,
    /// Position of the winning source in the priority list.
    pub source_index: usize,
    /// Description of the winning source.
    pub source: String,
    /// Number of features loaded.
    pub feature_count: usize,
    /// Whether the layer starts visible.
    pub visible: bool,
    /// Extent of the layer's polygons, if any.
    pub bounds: Option<BoundingBox>,
}

/// A layer that was left off the map.
#[derive(Debug, Clone, Serialize)]
pub struct OmittedLayer {
    /// Layer identifier.
    pub id: String,
    /// Why it was omitted.
    pub reason: String,
}

/// Outcome of a [`Viewer::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewerReport {
    /// Layers added to the sink, in configured order.
    pub loaded: Vec<LayerSummary>,
    /// Layers that could not be loaded.
    pub omitted: Vec<OmittedLayer>,
    /// Extent the view was fitted to, if any.
    pub fitted_bounds: Option<BoundingBox>,
}

/// Drives layer loading for one view.
pub struct Viewer<'a> {
    fetcher: &'a dyn SourceFetcher,
    layers: Vec<LayerDefinition>,
}

impl<'a> Viewer<'a> {
    /// Creates a viewer for the given layers.
    #[must_use]
    pub fn new(fetcher: &'a dyn SourceFetcher, layers: Vec<LayerDefinition>) -> Self {
        Self { fetcher, layers }
    }

    /// Returns the configured layers.
    #[must_use]
    pub fn layers(&self) -> &[LayerDefinition] {
        &self.layers
    }

    /// Loads every layer, adds the successful ones to `sink` and fits the
    /// view.
    ///
    /// The view is fitted to the layers marked `fit_bounds`, or to every
    /// loaded layer if none of those loaded. If no loaded layer has
    /// polygon bounds, the fit is skipped.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it rejects a layer or view change.
    /// Layer loading failures are not errors; they show up in
    /// [`ViewerReport::omitted`].
    pub async fn run<S: LayerSink>(&self, sink: &mut S) -> Result<ViewerReport, S::Error> {
        log::info!("Loading {} layer(s)", self.layers.len());

        let results = join_all(
            self.layers
                .iter()
                .map(|layer| load_layer(self.fetcher, layer)),
        )
        .await;

        let mut report = ViewerReport::default();
        let mut fit_layers: Vec<LoadedLayer> = Vec::new();
        let mut other_layers: Vec<LoadedLayer> = Vec::new();

        for (layer, result) in self.layers.iter().zip(results) {
            let mut loaded = match result {
                Ok(loaded) => loaded,
                Err(e) => {
                    log::error!("Omitting layer {}: {e}", layer.id);
                    report.omitted.push(OmittedLayer {
                        id: layer.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(settings) = &layer.buildings {
                apply_building_heights(&mut loaded.collection, settings);
            }

            sink.add_layer(&layer.id, &layer.name, &loaded.collection)?;
            sink.set_visibility(&layer.id, layer.visible)?;

            report.loaded.push(LayerSummary {
                id: layer.id.clone(),
                name: layer.name.clone(),
                source_index: loaded.source_index,
                source: loaded.source.to_string(),
                feature_count: loaded.feature_count(),
                visible: layer.visible,
                bounds: feature_collection_bbox(&loaded.collection),
            });

            if layer.fit_bounds {
                fit_layers.push(loaded);
            } else {
                other_layers.push(loaded);
            }
        }

        let fit_from = if fit_layers.is_empty() {
            &other_layers
        } else {
            &fit_layers
        };
        report.fitted_bounds = collections_bbox(fit_from.iter().map(|l| &l.collection));

        match &report.fitted_bounds {
            Some(bounds) => {
                log::info!("Fitting view to {:?}", bounds.to_array());
                sink.fit_bounds(bounds)?;
            }
            None => log::info!("No polygon bounds available, keeping the default view"),
        }

        log::info!(
            "View ready: {} layer(s) loaded, {} omitted",
            report.loaded.len(),
            report.omitted.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::convert::Infallible;

    use async_trait::async_trait;
    use geojson::FeatureCollection;
    use town_viewer_layer_models::{BuildingHeights, SourceSpec};

    use super::*;
    use crate::FetchError;

    /// Serves fixed payloads by location; unknown locations fail.
    struct MapFetcher(BTreeMap<String, serde_json::Value>);

    #[async_trait]
    impl SourceFetcher for MapFetcher {
        async fn fetch(&self, source: &SourceSpec) -> Result<serde_json::Value, FetchError> {
            self.0
                .get(source.location())
                .cloned()
                .ok_or_else(|| FetchError::Transfer {
                    message: "HTTP 503".to_string(),
                })
        }
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Add(String, usize),
        Visibility(String, bool),
        Fit([[f64; 2]; 2]),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<Call>,
    }

    impl LayerSink for RecordingSink {
        type Error = Infallible;

        fn add_layer(
            &mut self,
            id: &str,
            _name: &str,
            collection: &FeatureCollection,
        ) -> Result<(), Self::Error> {
            self.calls
                .push(Call::Add(id.to_string(), collection.features.len()));
            Ok(())
        }

        fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), Self::Error> {
            self.calls.push(Call::Visibility(id.to_string(), visible));
            Ok(())
        }

        fn fit_bounds(&mut self, bounds: &BoundingBox) -> Result<(), Self::Error> {
            self.calls.push(Call::Fit(bounds.to_array()));
            Ok(())
        }
    }

    fn rect(sw: [f64; 2], ne: [f64; 2], properties: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[sw, [ne[0], sw[1]], ne, [sw[0], ne[1]], sw]]
            },
            "properties": properties
        })
    }

    fn layer(id: &str, location: &str, fit_bounds: bool) -> LayerDefinition {
        LayerDefinition {
            id: id.to_string(),
            name: id.to_uppercase(),
            min_features: 1,
            visible: true,
            fit_bounds,
            buildings: None,
            sources: vec![SourceSpec::GeojsonUrl {
                url: location.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn omits_failed_layers_and_fits_flagged_ones() {
        let mut payloads = BTreeMap::new();
        payloads.insert(
            "zoning".to_string(),
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [rect([-72.40, 43.47], [-72.38, 43.49], &serde_json::json!({ "ZONE": "R-1" }))]
            }),
        );
        payloads.insert(
            "parcels".to_string(),
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [rect([-72.60, 43.30], [-72.59, 43.31], &serde_json::json!({}))]
            }),
        );
        let fetcher = MapFetcher(payloads);

        let mut overlay = layer("overlay", "overlay", false);
        overlay.visible = false;
        let viewer = Viewer::new(
            &fetcher,
            vec![
                layer("zoning", "zoning", true),
                layer("parcels", "parcels", false),
                layer("flood", "flood", false),
                overlay,
            ],
        );

        let mut sink = RecordingSink::default();
        let report = viewer.run(&mut sink).await.unwrap();

        assert_eq!(
            sink.calls,
            vec![
                Call::Add("zoning".to_string(), 1),
                Call::Visibility("zoning".to_string(), true),
                Call::Add("parcels".to_string(), 1),
                Call::Visibility("parcels".to_string(), true),
                Call::Fit([[-72.40, 43.47], [-72.38, 43.49]]),
            ]
        );

        let loaded: Vec<&str> = report.loaded.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(loaded, vec!["zoning", "parcels"]);
        let omitted: Vec<&str> = report.omitted.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(omitted, vec!["flood", "overlay"]);
        assert!(report.omitted[0].reason.contains("No data available"));
    }

    #[tokio::test]
    async fn nothing_reaches_the_sink_when_everything_fails() {
        let fetcher = MapFetcher(BTreeMap::new());
        let viewer = Viewer::new(
            &fetcher,
            vec![layer("zoning", "zoning", true), layer("flood", "flood", false)],
        );

        let mut sink = RecordingSink::default();
        let report = viewer.run(&mut sink).await.unwrap();

        assert!(sink.calls.is_empty());
        assert!(report.loaded.is_empty());
        assert_eq!(report.omitted.len(), 2);
        assert!(report.fitted_bounds.is_none());
    }

    #[tokio::test]
    async fn fits_all_layers_when_none_flagged() {
        let mut payloads = BTreeMap::new();
        payloads.insert(
            "a".to_string(),
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [rect([-72.40, 43.47], [-72.39, 43.48], &serde_json::json!({}))]
            }),
        );
        payloads.insert(
            "b".to_string(),
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [rect([-72.38, 43.49], [-72.37, 43.50], &serde_json::json!({}))]
            }),
        );
        let fetcher = MapFetcher(payloads);
        let viewer = Viewer::new(&fetcher, vec![layer("a", "a", false), layer("b", "b", false)]);

        let mut sink = RecordingSink::default();
        let report = viewer.run(&mut sink).await.unwrap();

        let bounds = report.fitted_bounds.unwrap();
        assert!(bounds.contains(-72.40, 43.47));
        assert!(bounds.contains(-72.37, 43.50));
    }

    #[tokio::test]
    async fn building_heights_are_filled_before_the_sink() {
        struct HeightSink(Vec<f64>);

        impl LayerSink for HeightSink {
            type Error = Infallible;

            fn add_layer(
                &mut self,
                _id: &str,
                _name: &str,
                collection: &FeatureCollection,
            ) -> Result<(), Self::Error> {
                self.0.extend(
                    collection
                        .features
                        .iter()
                        .filter_map(|f| f.property("height_m").and_then(serde_json::Value::as_f64)),
                );
                Ok(())
            }

            fn set_visibility(&mut self, _id: &str, _visible: bool) -> Result<(), Self::Error> {
                Ok(())
            }

            fn fit_bounds(&mut self, _bounds: &BoundingBox) -> Result<(), Self::Error> {
                Ok(())
            }
        }

        let mut payloads = BTreeMap::new();
        payloads.insert(
            "buildings".to_string(),
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [
                    rect([-72.385, 43.480], [-72.3848, 43.4802], &serde_json::json!({ "building:levels": "2" })),
                    rect([-72.386, 43.481], [-72.3858, 43.4812], &serde_json::json!({}))
                ]
            }),
        );
        let fetcher = MapFetcher(payloads);

        let mut buildings = layer("buildings", "buildings", true);
        buildings.buildings = Some(BuildingHeights::default());
        let viewer = Viewer::new(&fetcher, vec![buildings]);

        let mut sink = HeightSink(Vec::new());
        viewer.run(&mut sink).await.unwrap();

        assert_eq!(sink.0, vec![6.0, 6.0]);
    }
}
