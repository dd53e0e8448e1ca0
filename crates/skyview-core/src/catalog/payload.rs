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

//! Decoders for the single-file catalogs.

use log::debug;
use serde::Deserialize;

use super::{CatalogError, ComparisonSource, Field, Hull};

#[derive(Debug, Deserialize)]
struct Csc11Object {
    ra: Option<f64>,
    dec: Option<f64>,
    #[serde(default)]
    name: Option<String>,
}

/// Decode the CSC 1.1 catalog: a list of `{ra, dec, ...}` objects.
pub fn parse_csc11(text: &str) -> Result<Vec<ComparisonSource>, CatalogError> {
    let objects: Vec<Csc11Object> = serde_json::from_str(text)?;
    Ok(objects
        .into_iter()
        .map(|o| ComparisonSource {
            ra: o.ra,
            dec: o.dec,
            name: o.name,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct XmmPayload {
    catalog: String,
    sources: Vec<Vec<Field>>,
}

/// Decode the XMM catalog: `{catalog, sources: [[ra, dec, ...], ...]}`.
///
/// Returns the catalog name carried by the payload together with the
/// sources.
pub fn parse_xmm(text: &str) -> Result<(String, Vec<ComparisonSource>), CatalogError> {
    let payload: XmmPayload = serde_json::from_str(text)?;
    let sources = payload
        .sources
        .into_iter()
        .map(|row| ComparisonSource {
            ra: row.first().and_then(Field::as_f64),
            dec: row.get(1).and_then(Field::as_f64),
            name: None,
        })
        .collect();
    Ok((payload.catalog, sources))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHull {
    Flagged(Field, Vec<[f64; 2]>),
    Plain(Vec<[f64; 2]>),
}

/// Decode the convex-hull sources: a list of `[changed, [[ra, dec], ...]]`.
/// Bare vertex lists are accepted and treated as unchanged hulls.
pub fn parse_chs(text: &str) -> Result<Vec<Hull>, CatalogError> {
    let raw: Vec<RawHull> = serde_json::from_str(text)?;
    let hulls: Vec<Hull> = raw
        .into_iter()
        .map(|hull| {
            let (changed, points) = match hull {
                RawHull::Flagged(flag, points) => (flag.as_bool().unwrap_or(false), points),
                RawHull::Plain(points) => (false, points),
            };
            Hull {
                changed,
                points: points.into_iter().map(|[ra, dec]| (ra, dec)).collect(),
            }
        })
        .collect();
    debug!("Decoded {} hulls", hulls.len());
    Ok(hulls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csc11() {
        let text = r#"[{"ra": 10.5, "dec": -3.25, "name": "1CXO J004200.0-031500"},
                       {"ra": null, "dec": 4.0, "extra": 12}]"#;
        let sources = parse_csc11(text).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].position(), Some((10.5, -3.25)));
        assert_eq!(sources[0].name.as_deref(), Some("1CXO J004200.0-031500"));
        assert_eq!(sources[1].position(), None);
    }

    #[test]
    fn test_parse_xmm_keeps_catalog_name() {
        let text = r#"{"catalog": "4XMM-DR12", "sources": [[1.5, 2.5], [3.0, null, 7]]}"#;
        let (label, sources) = parse_xmm(text).unwrap();
        assert_eq!(label, "4XMM-DR12");
        assert_eq!(sources[0].position(), Some((1.5, 2.5)));
        assert_eq!(sources[1].dec, None);
    }

    #[test]
    fn test_parse_chs() {
        let text = r"[[true, [[1.0, 2.0], [1.1, 2.0], [1.1, 2.1]]],
                      [0, [[5.0, 6.0], [5.1, 6.0], [5.1, 6.1]]],
                      [[9.0, 9.0], [9.1, 9.0], [9.1, 9.1]]]";
        let hulls = parse_chs(text).unwrap();
        assert_eq!(hulls.len(), 3);
        assert!(hulls[0].changed);
        assert!(!hulls[1].changed);
        assert!(!hulls[2].changed);
        assert_eq!(hulls[2].points[1], (9.1, 9.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_xmm("[1, 2]"), Err(CatalogError::Decode(_))));
        assert!(parse_chs("{}").is_err());
        assert!(parse_csc11("[{\"ra\": \"x\"}]").is_err());
    }
}
