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

//! Summary data for the sources currently in view.
//!
//! Collected whenever the primary catalog is shown, and handed to whatever
//! front end draws the charts.

use serde::Serialize;

use super::SourceProperties;

/// Hardness ratios at or beyond this magnitude are pegged and dominate
/// the distribution, so they are left out.
const HARDNESS_LIMIT: f64 = 0.999;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FluxSignificance {
    pub significance: Vec<f64>,
    pub flux: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hardness {
    pub hm: Vec<f64>,
    pub ms: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionError {
    pub r0: Vec<f64>,
    pub r1: Vec<f64>,
    pub eccentricity: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationCounts {
    pub acis: Vec<u32>,
    pub hrc: Vec<u32>,
}

/// Per-chart data; a chart with nothing to plot is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlotData {
    pub flux_broad: Option<FluxSignificance>,
    pub flux_wide: Option<FluxSignificance>,
    pub hardness: Option<Hardness>,
    pub position_error: Option<PositionError>,
    pub observation_counts: Option<ObservationCounts>,
}

fn unpegged(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.abs() < HARDNESS_LIMIT)
}

fn non_empty<T>(value: T, empty: bool) -> Option<T> {
    (!empty).then_some(value)
}

impl PlotData {
    pub fn from_sources<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a SourceProperties>,
    {
        let mut broad = FluxSignificance::default();
        let mut wide = FluxSignificance::default();
        let mut hardness = Hardness::default();
        let mut poserr = PositionError::default();
        let mut counts = ObservationCounts::default();

        for src in sources {
            if let (Some(r0), Some(r1)) = (src.err_ellipse_r0, src.err_ellipse_r1) {
                poserr.r0.push(r0);
                poserr.r1.push(r1);
                poserr.eccentricity.push((1.0 - (r1 * r1) / (r0 * r0)).sqrt());
            }

            if let (Some(hm), Some(ms)) = (unpegged(src.hard_hm), unpegged(src.hard_ms)) {
                hardness.hm.push(hm);
                hardness.ms.push(ms);
            }

            if let Some(n) = src.acis_num.filter(|n| *n > 0) {
                counts.acis.push(n);
            }
            if let Some(n) = src.hrc_num.filter(|n| *n > 0) {
                counts.hrc.push(n);
            }

            let (Some(sig), Some(flux)) = (src.significance, src.flux) else {
                continue;
            };
            let band = match src.fluxband.as_deref() {
                Some("broad") => &mut broad,
                Some("wide") => &mut wide,
                _ => continue,
            };
            band.significance.push(sig);
            band.flux.push(flux);
        }

        let broad_empty = broad.flux.is_empty();
        let wide_empty = wide.flux.is_empty();
        let hardness_empty = hardness.hm.is_empty();
        let poserr_empty = poserr.r0.is_empty();
        let counts_empty = counts.acis.is_empty() && counts.hrc.is_empty();

        Self {
            flux_broad: non_empty(broad, broad_empty),
            flux_wide: non_empty(wide, wide_empty),
            hardness: non_empty(hardness, hardness_empty),
            position_error: non_empty(poserr, poserr_empty),
            observation_counts: non_empty(counts, counts_empty),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flux_broad.is_none()
            && self.flux_wide.is_none()
            && self.hardness.is_none()
            && self.position_error.is_none()
            && self.observation_counts.is_none()
    }
}
