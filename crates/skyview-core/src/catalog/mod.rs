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

//! Catalog store.
//!
//! Four catalogs can be overlaid on the sky: the primary CSC 2.0 source
//! catalog, two comparison catalogs (CSC 1.1 and an XMM catalog) and the
//! static convex-hull sources. Each has a label, a display style and,
//! once its data has arrived, a set of rows. Rows are immutable once
//! loaded and each catalog is loaded at most once per session.

pub mod loader;
mod payload;
mod plot;
pub mod schema;

pub use loader::{
    chunk_file_name, ChunkOutcome, ChunkPayload, ChunkedLoader, Generation, LoadError,
    DEFAULT_CHUNK_COUNT, DEFAULT_CHUNK_PATTERN,
};
pub use payload::{parse_chs, parse_csc11, parse_xmm};
pub use plot::{FluxSignificance, Hardness, ObservationCounts, PlotData, PositionError};
pub use schema::{column_index, SourceProperties, CSC_COLUMNS};

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use crate::render::Color;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("unknown catalog: {0}")]
    UnknownCatalog(String),

    #[error("source size must be positive, got {0}")]
    InvalidSize(f64),

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("the {0} catalog has already been loaded")]
    AlreadyLoaded(String),

    #[error("the {0} catalog has not been loaded")]
    NotLoaded(String),

    #[error("catalog data for {kind} does not match the catalog type")]
    WrongData { kind: CatalogKind },

    #[error("failed to decode catalog data: {0}")]
    Decode(#[from] serde_json::Error),
}

/// How a catalog participates in the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogRole {
    /// Full source properties; supports source selection and plots.
    Primary,
    /// Positions only, drawn for comparison.
    Comparison,
    /// Shown in full with no field-of-view filter.
    Static,
}

/// Shape drawn for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Polygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogKind {
    Csc20,
    Csc11,
    Xmm,
    Chs,
}

impl CatalogKind {
    pub const ALL: [Self; 4] = [Self::Csc20, Self::Csc11, Self::Xmm, Self::Chs];

    /// Short identifier used in commands and configuration.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Csc20 => "csc20",
            Self::Csc11 => "csc11",
            Self::Xmm => "xmm",
            Self::Chs => "chs",
        }
    }

    #[must_use]
    pub fn default_label(self) -> &'static str {
        match self {
            Self::Csc20 => "CSC2.0",
            Self::Csc11 => "CSC1.1",
            Self::Xmm => "XMM",
            Self::Chs => "CHS",
        }
    }

    #[must_use]
    pub fn role(self) -> CatalogRole {
        match self {
            Self::Csc20 => CatalogRole::Primary,
            Self::Csc11 | Self::Xmm => CatalogRole::Comparison,
            Self::Chs => CatalogRole::Static,
        }
    }

    #[must_use]
    pub fn marker(self) -> Marker {
        match self {
            Self::Csc20 | Self::Csc11 | Self::Xmm => Marker::Circle,
            Self::Chs => Marker::Polygon,
        }
    }

    /// Whether showing the catalog is restricted to the current field of
    /// view.
    #[must_use]
    pub fn fov_filtered(self) -> bool {
        self.role() != CatalogRole::Static
    }

    #[must_use]
    pub fn default_style(self) -> CatalogStyle {
        let (color, arcsec, opacity) = match self {
            Self::Csc20 => (Color::CYAN, 5.0, 0.1),
            Self::Csc11 => (Color::ORANGE, 7.0, 0.1),
            Self::Xmm => (Color::GREEN, 10.0, 0.1),
            Self::Chs => (Color::CYAN, 0.0, 0.6),
        };
        CatalogStyle {
            color,
            size_deg: arcsec / 3600.0,
            opacity,
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CatalogKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.key() == lower)
            .ok_or_else(|| CatalogError::UnknownCatalog(s.to_owned()))
    }
}

/// Marker color, angular size, and opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStyle {
    pub color: Color,
    /// Marker radius in degrees.
    pub size_deg: f64,
    pub opacity: f64,
}

impl CatalogStyle {
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Set the marker radius from a value in arc-seconds.
    pub fn set_size_arcsec(&mut self, arcsec: f64) -> Result<(), CatalogError> {
        if !arcsec.is_finite() || arcsec <= 0.0 {
            debug!("Rejected source size {arcsec}");
            return Err(CatalogError::InvalidSize(arcsec));
        }
        self.size_deg = arcsec / 3600.0;
        Ok(())
    }

    #[must_use]
    pub fn size_arcsec(&self) -> f64 {
        self.size_deg * 3600.0
    }
}

/// A scalar catalog value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Null,
    Flag(bool),
    Number(f64),
    Text(String),
}

impl Field {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Flags arrive either as JSON booleans or as 0/1.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

pub type CatalogRow = Vec<Field>;

/// A position-only source from a comparison catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSource {
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub name: Option<String>,
}

impl ComparisonSource {
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.ra?, self.dec?))
    }
}

/// A convex-hull source outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Hull {
    /// Whether the hull was changed from the automatically derived one.
    pub changed: bool,
    pub points: Vec<(f64, f64)>,
}

/// Loaded rows of one catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogData {
    Sources(Vec<CatalogRow>),
    Comparison(Vec<ComparisonSource>),
    Hulls(Vec<Hull>),
}

impl CatalogData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sources(rows) => rows.len(),
            Self::Comparison(rows) => rows.len(),
            Self::Hulls(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of row `index`. Hulls use their first vertex.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<(f64, f64)> {
        match self {
            Self::Sources(rows) => schema::row_position(rows.get(index)?),
            Self::Comparison(rows) => rows.get(index)?.position(),
            Self::Hulls(rows) => rows.get(index)?.points.first().copied(),
        }
    }

    fn fits(&self, kind: CatalogKind) -> bool {
        matches!(
            (self, kind),
            (Self::Sources(_), CatalogKind::Csc20)
                | (Self::Comparison(_), CatalogKind::Csc11 | CatalogKind::Xmm)
                | (Self::Hulls(_), CatalogKind::Chs)
        )
    }
}

/// Label, style, and data of one catalog.
#[derive(Debug, Clone)]
pub struct CatalogState {
    kind: CatalogKind,
    label: String,
    style: CatalogStyle,
    data: Option<CatalogData>,
}

impl CatalogState {
    #[must_use]
    pub fn new(kind: CatalogKind) -> Self {
        Self {
            kind,
            label: kind.default_label().to_owned(),
            style: kind.default_style(),
            data: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn style(&self) -> &CatalogStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut CatalogStyle {
        &mut self.style
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    #[must_use]
    pub fn data(&self) -> Option<&CatalogData> {
        self.data.as_ref()
    }

    /// Primary catalog rows, when loaded.
    #[must_use]
    pub fn rows(&self) -> Option<&[CatalogRow]> {
        match &self.data {
            Some(CatalogData::Sources(rows)) => Some(rows),
            _ => None,
        }
    }

    /// Store the catalog data. A catalog is loaded exactly once; a label
    /// carried by the payload replaces the default one.
    pub fn set_data(
        &mut self,
        data: CatalogData,
        label: Option<String>,
    ) -> Result<(), CatalogError> {
        if self.data.is_some() {
            return Err(CatalogError::AlreadyLoaded(self.label.clone()));
        }
        if !data.fits(self.kind) {
            return Err(CatalogError::WrongData { kind: self.kind });
        }

        if let Some(label) = label {
            info!("Catalog label changed from [{}] to [{label}]", self.label);
            self.label = label;
        }
        info!("Loaded {} rows for {}", data.len(), self.label);
        self.data = Some(data);
        Ok(())
    }
}

/// The state of every catalog, indexed by kind.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    catalogs: [CatalogState; 4],
}

impl CatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalogs: CatalogKind::ALL.map(CatalogState::new),
        }
    }

    #[must_use]
    pub fn get(&self, kind: CatalogKind) -> &CatalogState {
        &self.catalogs[kind as usize]
    }

    pub fn get_mut(&mut self, kind: CatalogKind) -> &mut CatalogState {
        &mut self.catalogs[kind as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogState> {
        self.catalogs.iter()
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}
