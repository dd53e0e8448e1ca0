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

//! View state, zoom limits, image layers and bookmarks.

use std::fmt::Write as _;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lookup::{escape_query_value, unescape_query_value};
use crate::stacks::is_valid_stack_id;

/// Smallest field of view the viewer will zoom to, in degrees.
pub const MIN_FOV: f64 = 0.000_229_109_344_374_887_27;
/// Largest field of view, in degrees.
pub const MAX_FOV: f64 = 60.0;
/// Multiplicative step for zoom in/out.
pub const ZOOM_FACTOR: f64 = 1.25;

/// Storage key for the selected foreground image.
pub const FOREGROUND_KEY: &str = "wwt-foreground";
/// Storage key for the last persisted view.
pub const LOCATION_KEY: &str = "wwt-location";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("unknown image layer: {0}")]
    UnknownImage(String),

    #[error("field of view {0} is outside the supported range")]
    FovOutOfRange(f64),

    #[error("invalid stored view: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Center and field of view of the sky display, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub ra: f64,
    pub dec: f64,
    pub fov: f64,
}

impl Default for ViewState {
    /// The start location: the Large Magellanic Cloud at a 5 degree field.
    fn default() -> Self {
        Self {
            ra: 84.676_65,
            dec: -69.1009,
            fov: 5.0,
        }
    }
}

impl ViewState {
    /// Same center with a new field of view, or `None` if out of range.
    #[must_use]
    pub fn zoomed(self, fov: f64) -> Option<Self> {
        fov_in_range(fov).then_some(Self { fov, ..self })
    }

    #[must_use]
    pub fn apply(self, action: ZoomAction) -> Option<Self> {
        let fov = match action {
            ZoomAction::In => self.fov / ZOOM_FACTOR,
            ZoomAction::Out => self.fov * ZOOM_FACTOR,
            ZoomAction::To(fov) => fov,
        };
        self.zoomed(fov)
    }

    /// Serialize for the location store.
    pub fn to_json(&self) -> Result<String, ViewError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a persisted view, rejecting values outside the valid ranges.
    pub fn from_json(text: &str) -> Result<Self, ViewError> {
        let view: Self = serde_json::from_str(text)?;
        if !fov_in_range(view.fov) {
            return Err(ViewError::FovOutOfRange(view.fov));
        }
        Ok(Self {
            ra: view.ra.rem_euclid(360.0),
            dec: view.dec.clamp(-90.0, 90.0),
            fov: view.fov,
        })
    }

    /// Has the view moved enough to be worth persisting again?
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-9;
        (self.ra - other.ra).abs() > EPS
            || (self.dec - other.dec).abs() > EPS
            || (self.fov - other.fov).abs() > EPS
    }
}

fn fov_in_range(fov: f64) -> bool {
    (MIN_FOV..=MAX_FOV).contains(&fov)
}

/// Zoom request from the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomAction {
    In,
    Out,
    /// Jump straight to a field of view in degrees.
    To(f64),
}

/// Short name and full collection name of each selectable foreground.
const IMAGE_LAYERS: &[(&str, &str)] = &[
    ("wmap", "WMAP ILC 5-Year Cosmic Microwave Background"),
    ("dust", "SFD Dust Map (Infrared)"),
    ("2mass-cat", "2MASS: Catalog (Synthetic, Near Infrared)"),
    ("2mass-image", "2Mass: Imagery (Infrared)"),
    ("dss", "Digitized Sky Survey (Color)"),
    ("vlss", "VLSS: VLA Low-frequency Sky Survey (Radio)"),
    ("planck-cmb", "Planck CMB"),
    ("planck-dust-gas", "Planck Dust & Gas"),
    ("iris", "IRIS: Improved Reprocessing of IRAS Survey (Infrared)"),
    ("wise", "WISE All Sky (Infrared)"),
    ("halpha", "Hydrogen Alpha Full Sky Map"),
    ("sdss", "SDSS: Sloan Digital Sky Survey (Optical)"),
    ("tycho", "Tycho (Synthetic, Optical)"),
    ("usnob1", "USNOB: US Naval Observatory B 1.0 (Synthetic, Optical)"),
    ("galex4-nuv", "GALEX 4 Near-UV"),
    ("galex4-fuv", "GALEX 4 Far-UV"),
    ("galex", "GALEX (Ultraviolet)"),
    ("rass", "RASS: ROSAT All Sky Survey (X-ray)"),
    ("fermi3", "Fermi Year Three (Gamma)"),
];

/// How to present a selected image layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foreground {
    /// The background survey; the foreground is made transparent.
    Background,
    /// A named foreground image shown fully opaque.
    Image(&'static str),
}

impl Foreground {
    /// Opacity in percent to apply with this foreground.
    #[must_use]
    pub fn opacity(self) -> f64 {
        match self {
            Self::Background => 0.0,
            Self::Image(_) => 100.0,
        }
    }
}

/// Resolve an image-layer short name.
pub fn image_layer(name: &str) -> Result<Foreground, ViewError> {
    if name == "dss" {
        return Ok(Foreground::Background);
    }
    IMAGE_LAYERS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, full)| Foreground::Image(*full))
        .ok_or_else(|| ViewError::UnknownImage(name.to_owned()))
}

/// All known image-layer short names.
pub fn image_layer_names() -> impl Iterator<Item = &'static str> {
    IMAGE_LAYERS.iter().map(|(key, _)| *key)
}

/// View state that can be shared as a URL query.
///
/// Each field is validated on its own; a bad field is dropped rather than
/// spoiling the whole bookmark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bookmark {
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub zoom: Option<f64>,
    pub display: Option<String>,
    pub stack_id: Option<String>,
}

impl Bookmark {
    /// Bookmark for the given view.
    #[must_use]
    pub fn from_view(view: ViewState) -> Self {
        Self {
            ra: Some(view.ra.rem_euclid(360.0)),
            dec: Some(view.dec),
            zoom: Some(view.fov),
            display: None,
            stack_id: None,
        }
    }

    /// Parse a query string such as `ra=84.6&dec=-69.1&zoom=2`.
    ///
    /// A leading `?` is ignored. Unknown keys are ignored.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut out = Self::default();
        let query = query.trim().trim_start_matches('?');

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let Some(value) = unescape_query_value(raw) else {
                warn!("Bookmark: undecodable value for {key}");
                continue;
            };

            match key {
                "ra" => out.ra = parse_field(key, &value, |v| (0.0..360.0).contains(&v)),
                "dec" => out.dec = parse_field(key, &value, |v| (-90.0..=90.0).contains(&v)),
                "zoom" => out.zoom = parse_field(key, &value, |v| v > 0.0 && v <= MAX_FOV),
                "display" => {
                    if image_layer(&value).is_ok() {
                        out.display = Some(value);
                    } else {
                        warn!("Bookmark: unknown display {value}");
                    }
                }
                "stackid" => {
                    if is_valid_stack_id(&value) {
                        out.stack_id = Some(value);
                    } else {
                        warn!("Bookmark: invalid stackid {value}");
                    }
                }
                _ => debug!("Bookmark: ignoring {key}"),
            }
        }

        out
    }

    /// Encode as a query string (without the leading `?`).
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut out = String::new();
        let mut push = |key: &str, value: &str| {
            if !out.is_empty() {
                out.push('&');
            }
            let _ = write!(out, "{key}={}", escape_query_value(value));
        };

        if let Some(ra) = self.ra {
            push("ra", &ra.to_string());
        }
        if let Some(dec) = self.dec {
            push("dec", &dec.to_string());
        }
        if let Some(zoom) = self.zoom {
            push("zoom", &zoom.to_string());
        }
        if let Some(display) = &self.display {
            push("display", display);
        }
        if let Some(stack) = &self.stack_id {
            push("stackid", stack);
        }
        out
    }

    /// Merge the bookmarked position over `base`.
    ///
    /// A zoom beyond the smallest supported field is clamped up to it.
    #[must_use]
    pub fn apply_to(&self, base: ViewState) -> ViewState {
        ViewState {
            ra: self.ra.unwrap_or(base.ra),
            dec: self.dec.unwrap_or(base.dec),
            fov: self.zoom.map_or(base.fov, |z| z.max(MIN_FOV)),
        }
    }
}

fn parse_field(key: &str, value: &str, valid: impl Fn(f64) -> bool) -> Option<f64> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && valid(v) => Some(v),
        _ => {
            warn!("Bookmark: invalid {key}={value}");
            None
        }
    }
}
