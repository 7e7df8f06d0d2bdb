//! `OpenStreetMap` Overpass fetcher.
//!
//! Overpass answers in its own JSON element format, not `GeoJSON`. Queries
//! are expected to end in `out geom;` so that each way carries its
//! coordinates inline. Closed ways become Polygon features with the OSM
//! tags as properties; nodes, open ways and relations are dropped.

use crate::{FetchError, http};

/// Runs an Overpass QL query and converts the result to a `GeoJSON`
/// `FeatureCollection`.
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails, the response cannot be
/// parsed, or Overpass reports a runtime error.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    query: &str,
) -> Result<serde_json::Value, FetchError> {
    log::debug!("  GET {url} (Overpass)");
    let json = http::send_json(client.get(url).query(&[("data", query)])).await?;
    elements_to_feature_collection(&json)
}

/// Converts an Overpass JSON response into a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`FetchError::Decode`] if there is no `elements` array, or if
/// Overpass returned no elements together with a runtime error remark.
pub fn elements_to_feature_collection(
    json: &serde_json::Value,
) -> Result<serde_json::Value, FetchError> {
    let elements = json["elements"]
        .as_array()
        .ok_or_else(|| FetchError::Decode {
            message: "No elements array in Overpass response".to_string(),
        })?;

    // Timeouts and memory exhaustion come back as a 200 with a remark
    // and whatever partial output was produced.
    if let Some(remark) = json["remark"].as_str() {
        if elements.is_empty() && remark.contains("error") {
            return Err(FetchError::Decode {
                message: format!("Overpass error: {remark}"),
            });
        }
        log::warn!("  Overpass remark: {remark}");
    }

    let features: Vec<serde_json::Value> = elements.iter().filter_map(way_to_feature).collect();

    Ok(serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

/// Converts a closed way with inline geometry into a Polygon feature.
fn way_to_feature(element: &serde_json::Value) -> Option<serde_json::Value> {
    if element["type"].as_str()? != "way" {
        return None;
    }

    let ring: Vec<[f64; 2]> = element["geometry"]
        .as_array()?
        .iter()
        .map(|node| Some([node["lon"].as_f64()?, node["lat"].as_f64()?]))
        .collect::<Option<_>>()?;

    // A linear ring needs at least four positions with the last one
    // repeating the first.
    if ring.len() < 4 || ring.first() != ring.last() {
        return None;
    }

    let mut properties = element["tags"].as_object().cloned().unwrap_or_default();
    if let Some(id) = element["id"].as_i64() {
        properties.insert("osm_id".to_string(), id.into());
    }

    Some(serde_json::json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring],
        },
        "properties": properties,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_closed_ways() {
        let body = serde_json::json!({
            "version": 0.6,
            "elements": [
                {
                    "type": "way",
                    "id": 123,
                    "tags": { "building": "yes", "building:levels": "3" },
                    "geometry": [
                        { "lat": 43.47, "lon": -72.40 },
                        { "lat": 43.47, "lon": -72.39 },
                        { "lat": 43.48, "lon": -72.39 },
                        { "lat": 43.47, "lon": -72.40 }
                    ]
                },
                {
                    "type": "way",
                    "id": 124,
                    "tags": { "highway": "residential" },
                    "geometry": [
                        { "lat": 43.47, "lon": -72.40 },
                        { "lat": 43.48, "lon": -72.41 }
                    ]
                },
                { "type": "node", "id": 5, "lat": 43.47, "lon": -72.40 }
            ]
        });

        let fc = elements_to_feature_collection(&body).unwrap();
        let features = fc["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);

        let feature = &features[0];
        assert_eq!(feature["geometry"]["type"], "Polygon");
        assert_eq!(feature["geometry"]["coordinates"][0][0][0], -72.40);
        assert_eq!(feature["geometry"]["coordinates"][0][0][1], 43.47);
        assert_eq!(feature["properties"]["building:levels"], "3");
        assert_eq!(feature["properties"]["osm_id"], 123);
    }

    #[test]
    fn runtime_error_without_elements_is_decode_failure() {
        let body = serde_json::json!({
            "elements": [],
            "remark": "runtime error: Query timed out in \"query\" at line 1 after 26 seconds."
        });
        let err = elements_to_feature_collection(&body).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn missing_elements_is_decode_failure() {
        let body = serde_json::json!({ "type": "FeatureCollection", "features": [] });
        assert!(elements_to_feature_collection(&body).is_err());
    }
}
