//! A [`LayerSink`] that writes the view to a directory.
//!
//! Each layer becomes `<id>.geojson`, and [`DirectorySink::finish`]
//! writes a `view.json` manifest with layer visibility and the fitted
//! bounds, which a static map page can read at startup.

use std::path::PathBuf;

use geojson::FeatureCollection;
use serde::Serialize;
use thiserror::Error;
use town_viewer_extent::BoundingBox;
use town_viewer_layer::sink::LayerSink;

/// Errors from writing the view directory.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a layer or the manifest failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Visibility was set for a layer that was never added.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),
}

#[derive(Debug, Serialize)]
struct ManifestLayer {
    id: String,
    name: String,
    file: String,
    visible: bool,
}

#[derive(Debug, Default, Serialize)]
struct Manifest {
    layers: Vec<ManifestLayer>,
    bounds: Option<[[f64; 2]; 2]>,
}

/// Writes layers as `GeoJSON` files plus a view manifest.
pub struct DirectorySink {
    dir: PathBuf,
    manifest: Manifest,
}

impl DirectorySink {
    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            manifest: Manifest::default(),
        })
    }

    /// Writes `view.json` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the manifest cannot be written.
    pub fn finish(self) -> Result<PathBuf, SinkError> {
        let path = self.dir.join("view.json");
        std::fs::write(&path, serde_json::to_string_pretty(&self.manifest)?)?;
        Ok(path)
    }
}

impl LayerSink for DirectorySink {
    type Error = SinkError;

    fn add_layer(
        &mut self,
        id: &str,
        name: &str,
        collection: &FeatureCollection,
    ) -> Result<(), Self::Error> {
        let file = format!("{id}.geojson");
        let path = self.dir.join(&file);
        std::fs::write(&path, serde_json::to_string(collection)?)?;
        log::info!(
            "Wrote {} features to {}",
            collection.features.len(),
            path.display()
        );

        self.manifest.layers.retain(|layer| layer.id != id);
        self.manifest.layers.push(ManifestLayer {
            id: id.to_string(),
            name: name.to_string(),
            file,
            visible: true,
        });
        Ok(())
    }

    fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), Self::Error> {
        let layer = self
            .manifest
            .layers
            .iter_mut()
            .find(|layer| layer.id == id)
            .ok_or_else(|| SinkError::UnknownLayer(id.to_string()))?;
        layer.visible = visible;
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: &BoundingBox) -> Result<(), Self::Error> {
        self.manifest.bounds = Some(bounds.to_array());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_layers_and_manifest() {
        let dir = std::env::temp_dir().join(format!("town_viewer_sink_{}", std::process::id()));
        let mut sink = DirectorySink::create(&dir).unwrap();

        let fc: FeatureCollection = serde_json::from_value(serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-72.40, 43.47], [-72.38, 43.47], [-72.38, 43.49], [-72.40, 43.47]]]
                },
                "properties": { "ZONE": "R-1" }
            }]
        }))
        .unwrap();

        sink.add_layer("zoning", "Zoning Districts", &fc).unwrap();
        sink.set_visibility("zoning", false).unwrap();
        assert!(matches!(
            sink.set_visibility("flood", true),
            Err(SinkError::UnknownLayer(_))
        ));
        sink.fit_bounds(&BoundingBox::new([-72.40, 43.47], [-72.38, 43.49]))
            .unwrap();

        let manifest_path = sink.finish().unwrap();
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["layers"][0]["id"], "zoning");
        assert_eq!(manifest["layers"][0]["file"], "zoning.geojson");
        assert_eq!(manifest["layers"][0]["visible"], false);
        assert_eq!(manifest["bounds"][1][1], 43.49);

        let written: FeatureCollection =
            serde_json::from_str(&std::fs::read_to_string(dir.join("zoning.geojson")).unwrap())
                .unwrap();
        assert_eq!(written.features.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
