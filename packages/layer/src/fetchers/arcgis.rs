//! `ArcGIS` `FeatureServer` / `MapServer` fetcher.
//!
//! Queries an `ArcGIS` REST layer with `f=geojson` and `outSR=4326` to get
//! standard `GeoJSON` in longitude/latitude. The first request carries no
//! paging parameters, since some `MapServer` layers reject them. Only when
//! a page reports `exceededTransferLimit` are further pages requested via
//! `resultOffset`. A query can also be restricted to an envelope (used for
//! statewide flood hazard layers that are only wanted around the current
//! view).

use town_viewer_extent::{BoundingBox, WGS84_WKID};

use crate::{FetchError, http};

/// Default page size when the layer definition does not set one.
const DEFAULT_MAX_RECORDS: u32 = 1000;

/// Upper bound on pages fetched for one query.
const MAX_PAGES: usize = 100;

/// Query parameters for one `ArcGIS` layer.
#[derive(Debug, Clone)]
pub struct ArcgisQuery<'a> {
    /// SQL `where` clause.
    pub where_clause: &'a str,
    /// Attribute fields to return; empty means `*`.
    pub out_fields: &'a [String],
    /// Spatial filter, if any.
    pub envelope: Option<BoundingBox>,
    /// Page size for follow-up pages.
    pub max_records: Option<u32>,
}

impl ArcgisQuery<'_> {
    /// Builds the query-string parameters for one page.
    ///
    /// `offset` is `None` for the first request, which leaves paging up
    /// to the server.
    #[must_use]
    pub fn params(&self, offset: Option<u32>) -> Vec<(&'static str, String)> {
        let out_fields = if self.out_fields.is_empty() {
            "*".to_string()
        } else {
            self.out_fields.join(",")
        };
        let wkid = WGS84_WKID.to_string();

        let mut params = vec![
            ("where", self.where_clause.to_string()),
            ("outFields", out_fields),
            ("returnGeometry", "true".to_string()),
            ("outSR", wkid.clone()),
            ("f", "geojson".to_string()),
        ];

        if let Some(offset) = offset {
            params.extend([
                (
                    "resultRecordCount",
                    self.max_records.unwrap_or(DEFAULT_MAX_RECORDS).to_string(),
                ),
                ("resultOffset", offset.to_string()),
            ]);
        }

        if let Some(envelope) = &self.envelope {
            params.extend([
                ("geometry", envelope.to_esri_envelope().to_string()),
                ("geometryType", "esriGeometryEnvelope".to_string()),
                ("inSR", wkid),
                ("spatialRel", "esriSpatialRelIntersects".to_string()),
            ]);
        }

        params
    }
}

/// Fetches all matching features from an `ArcGIS` layer.
///
/// Follows `exceededTransferLimit` with offset queries and merges the
/// pages into a single `FeatureCollection`.
///
/// # Errors
///
/// Returns [`FetchError`] if the first request fails, its response cannot
/// be parsed, or the server answers with an `ArcGIS` error object.
/// Failures on later pages end pagination but keep the features already
/// fetched.
pub async fn fetch(
    client: &reqwest::Client,
    layer_url: &str,
    query: &ArcgisQuery<'_>,
) -> Result<serde_json::Value, FetchError> {
    let query_url = format!("{}/query", layer_url.trim_end_matches('/'));
    let mut pages = Pages::default();

    loop {
        let offset = pages.next_offset();
        log::debug!("  GET {query_url} (offset {offset:?})");
        let page = http::send_json(client.get(&query_url).query(&query.params(offset))).await;

        if !pages.push(page)? {
            break;
        }
    }

    Ok(pages.into_collection())
}

/// Features collected so far across query pages.
#[derive(Debug, Default)]
struct Pages {
    features: Vec<serde_json::Value>,
    last_first: Option<serde_json::Value>,
    count: usize,
}

impl Pages {
    /// Offset for the next request, or `None` before the first page.
    fn next_offset(&self) -> Option<u32> {
        (self.count > 0).then(|| u32::try_from(self.features.len()).unwrap_or(u32::MAX))
    }

    /// Adds one page response and returns whether another page should be
    /// requested.
    fn push(
        &mut self,
        page: Result<serde_json::Value, FetchError>,
    ) -> Result<bool, FetchError> {
        let first_page = self.count == 0;
        self.count += 1;

        let parsed = page.and_then(|json| {
            let (features, exceeded) = parse_page(&json)?;
            Ok((features.clone(), exceeded))
        });

        let (features, exceeded) = match parsed {
            Ok(page) => page,
            Err(e) if first_page => return Err(e),
            Err(e) => {
                log::warn!(
                    "ArcGIS page {} failed, keeping {} features: {e}",
                    self.count,
                    self.features.len()
                );
                return Ok(false);
            }
        };

        let Some(first) = features.first() else {
            return Ok(false);
        };
        if self.last_first.as_ref() == Some(first) {
            log::warn!(
                "ArcGIS server repeated page {}; it likely ignores resultOffset. Keeping {} features",
                self.count - 1,
                self.features.len()
            );
            return Ok(false);
        }
        self.last_first = Some(first.clone());
        self.features.extend(features);

        if exceeded && self.count >= MAX_PAGES {
            log::warn!(
                "ArcGIS query stopped after {MAX_PAGES} pages with {} features",
                self.features.len()
            );
            return Ok(false);
        }

        Ok(exceeded)
    }

    fn into_collection(self) -> serde_json::Value {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": self.features,
        })
    }
}

/// Extracts the features of one query page and whether more pages
/// follow.
fn parse_page(json: &serde_json::Value) -> Result<(&Vec<serde_json::Value>, bool), FetchError> {
    // ArcGIS reports failures as HTTP 200 with an error object.
    if let Some(error) = json.get("error") {
        return Err(FetchError::Decode {
            message: format!(
                "ArcGIS API error: {}",
                error["message"].as_str().unwrap_or("unknown error")
            ),
        });
    }

    let features = json["features"]
        .as_array()
        .ok_or_else(|| FetchError::Decode {
            message: "No features array in ArcGIS response".to_string(),
        })?;

    // Plain JSON output puts the flag at the top level; GeoJSON output
    // from newer servers nests it under `properties`.
    let exceeded = json["exceededTransferLimit"]
        .as_bool()
        .or_else(|| json["properties"]["exceededTransferLimit"].as_bool())
        .unwrap_or(false);

    Ok((features, exceeded))
}
