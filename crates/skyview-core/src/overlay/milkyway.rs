// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Milky Way outline, read from a GeoJSON `FeatureCollection` of
//! `MultiPolygon` features in (lon, lat) form.

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use crate::render::{Geometry, Renderer, ShapeId, ShapeSpec, ShapeStyle};

#[derive(Error, Debug)]
pub enum OutlineError {
    #[error("outline data is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    #[error("outline feature {0} is not a MultiPolygon feature")]
    InvalidFeature(usize),

    #[error("outline feature {0} has no coordinates")]
    MissingCoordinates(usize),

    #[error("outline feature {feature} has {count} polygons, expected 1")]
    PolygonCount { feature: usize, count: usize },

    #[error("failed to decode outline data: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Option<Vec<RawFeature>>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(rename = "type")]
    kind: Option<String>,
    id: Option<serde_json::Value>,
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: Option<String>,
    coordinates: Option<Vec<Vec<Vec<[f64; 2]>>>>,
}

/// Convert GeoJSON longitude into right ascension.
fn lon_to_ra([lon, lat]: [f64; 2]) -> (f64, f64) {
    if lon < 0.0 {
        (lon + 360.0, lat)
    } else {
        (lon, lat)
    }
}

fn outline_rings(text: &str) -> Result<Vec<Vec<(f64, f64)>>, OutlineError> {
    let collection: RawCollection = serde_json::from_str(text)?;
    if collection.kind != "FeatureCollection" {
        return Err(OutlineError::NotFeatureCollection);
    }
    let features = collection
        .features
        .ok_or(OutlineError::NotFeatureCollection)?;

    let mut rings = Vec::new();
    for (index, feature) in features.into_iter().enumerate() {
        let geometry = match feature {
            RawFeature {
                kind: Some(kind),
                id: Some(_),
                geometry: Some(geometry),
            } if kind == "Feature" && geometry.kind.as_deref() == Some("MultiPolygon") => geometry,
            _ => return Err(OutlineError::InvalidFeature(index)),
        };

        let mut polygons = geometry
            .coordinates
            .ok_or(OutlineError::MissingCoordinates(index))?;
        if polygons.len() != 1 {
            return Err(OutlineError::PolygonCount {
                feature: index,
                count: polygons.len(),
            });
        }

        for ring in polygons.swap_remove(0) {
            rings.push(ring.into_iter().map(lon_to_ra).collect());
        }
    }
    Ok(rings)
}

/// Polylines tracing the Milky Way, toggled as a unit.
#[derive(Debug, Clone, Default)]
pub struct MilkyWayOverlay {
    outlines: Vec<ShapeId>,
    shown: bool,
}

impl MilkyWayOverlay {
    /// Create the outline shapes. The input is validated in full before any
    /// shape is created.
    pub fn from_geojson<R: Renderer>(text: &str, renderer: &mut R) -> Result<Self, OutlineError> {
        let rings = outline_rings(text)?;
        let outlines = rings
            .into_iter()
            .map(|points| {
                renderer.create_shape(ShapeSpec {
                    geometry: Geometry::Polyline { points },
                    style: ShapeStyle::default(),
                })
            })
            .collect::<Vec<_>>();
        info!("Added {} Milky Way outlines", outlines.len());
        Ok(Self {
            outlines,
            shown: false,
        })
    }

    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }

    /// Show or hide every outline. Returns the new state.
    pub fn toggle<R: Renderer>(&mut self, renderer: &mut R) -> bool {
        for shape in &self.outlines {
            if self.shown {
                renderer.remove_annotation(*shape);
            } else {
                renderer.add_annotation(*shape);
            }
        }
        self.shown = !self.shown;
        debug!("Milky Way outline shown: {}", self.shown);
        self.shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MemoryRenderer;

    const MW: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "id": "ol1", "properties": {},
         "geometry": {"type": "MultiPolygon", "coordinates": [[
            [[-10.0, 5.0], [20.0, 6.0], [30.0, 7.0]],
            [[40.0, -5.0], [-50.0, -6.0]]
         ]]}}
    ]}"#;

    #[test]
    fn test_load_and_toggle() {
        let mut renderer = MemoryRenderer::default();
        let mut mw = MilkyWayOverlay::from_geojson(MW, &mut renderer).unwrap();
        assert_eq!(mw.len(), 2);
        assert!(!mw.is_shown());
        assert_eq!(renderer.shown_count(), 0);

        assert!(mw.toggle(&mut renderer));
        assert_eq!(renderer.shown_count(), 2);

        let (_, first) = renderer.shown_shapes()[0];
        assert!(matches!(
            &first.geometry,
            Geometry::Polyline { points } if points[0] == (350.0, 5.0)
        ));

        assert!(!mw.toggle(&mut renderer));
        assert_eq!(renderer.shown_count(), 0);
    }

    #[test]
    fn test_malformed_rejected_without_shapes() {
        let mut renderer = MemoryRenderer::default();

        let err = MilkyWayOverlay::from_geojson(r#"{"type": "Feature"}"#, &mut renderer);
        assert!(matches!(err, Err(OutlineError::NotFeatureCollection)));

        let bad_geometry = MW.replace("MultiPolygon", "Polygon");
        let err = MilkyWayOverlay::from_geojson(&bad_geometry, &mut renderer);
        assert!(matches!(err, Err(OutlineError::InvalidFeature(0))));

        let two = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "id": 1, "geometry": {"type": "MultiPolygon",
             "coordinates": [[[[1.0, 2.0]]], [[[3.0, 4.0]]]]}}]}"#;
        let err = MilkyWayOverlay::from_geojson(two, &mut renderer);
        assert!(matches!(
            err,
            Err(OutlineError::PolygonCount { feature: 0, count: 2 })
        ));

        assert!(MilkyWayOverlay::from_geojson("[", &mut renderer).is_err());
        assert_eq!(renderer.shape_count(), 0);
    }
}
