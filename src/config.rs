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

//! Application configuration management.
//!
//! Settings are stored with confy under the `cscview` application name.
//! Every field carries a serde default so that older files keep loading as
//! fields are added.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyview_core::catalog::{DEFAULT_CHUNK_COUNT, DEFAULT_CHUNK_PATTERN};
use skyview_core::lookup::LOOKUP_URL;
use skyview_core::selection::{DEFAULT_NEARBY_SOURCE_COUNT, DEFAULT_NEARBY_STACK_ARCMIN};
use skyview_core::{CatalogKind, Color, ViewState, ViewerSettings};

pub const APP_NAME: &str = "cscview";

/// Per-catalog display overrides.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StyleOverride {
    pub color: Option<String>,
    /// Marker size in arc-seconds.
    pub size_arcsec: Option<f64>,
}

/// Application configuration stored with confy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Base URL (or local directory) holding the published data files
    #[serde(default = "default_data_url")]
    pub data_url: String,

    /// Number of source-property chunks
    #[serde(default = "default_chunk_count")]
    pub chunk_count: usize,

    /// Chunk file name; `{index}` is replaced by the 1-based chunk number
    #[serde(default = "default_chunk_pattern")]
    pub chunk_pattern: String,

    #[serde(default = "default_status_file")]
    pub status_file: String,

    #[serde(default = "default_stack_file")]
    pub stack_file: String,

    #[serde(default = "default_versions_file")]
    pub versions_file: String,

    #[serde(default = "default_milky_way_file")]
    pub milky_way_file: String,

    #[serde(default = "default_csc11_file")]
    pub csc11_file: String,

    #[serde(default = "default_xmm_file")]
    pub xmm_file: String,

    #[serde(default = "default_chs_file")]
    pub chs_file: String,

    /// Start location: right ascension in degrees
    #[serde(default = "default_start_ra")]
    pub start_ra: f64,

    /// Start location: declination in degrees
    #[serde(default = "default_start_dec")]
    pub start_dec: f64,

    /// Start location: field of view in degrees
    #[serde(default = "default_start_fov")]
    pub start_fov: f64,

    /// Radius of the nearby-stack search, in arc-minutes
    #[serde(default = "default_nearby_stack_arcmin")]
    pub nearby_stack_arcmin: f64,

    #[serde(default = "default_nearby_source_count")]
    pub nearby_source_count: usize,

    #[serde(default)]
    pub csc20_style: StyleOverride,

    #[serde(default)]
    pub csc11_style: StyleOverride,

    #[serde(default)]
    pub xmm_style: StyleOverride,

    /// Name resolver endpoint
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Keep downloaded files in the user cache directory
    #[serde(default = "default_true")]
    pub cache_downloads: bool,

    /// How often the session saves the view location, in seconds
    #[serde(default = "default_persist_interval")]
    pub persist_interval_secs: u64,

    #[serde(default = "default_init_timeout")]
    pub init_timeout_secs: u64,

    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_data_url() -> String {
    "https://cxc.cfa.harvard.edu/csc2/wwtdata/".to_owned()
}

fn default_chunk_count() -> usize {
    DEFAULT_CHUNK_COUNT
}

fn default_chunk_pattern() -> String {
    DEFAULT_CHUNK_PATTERN.to_owned()
}

fn default_status_file() -> String {
    "wwt_status.json".to_owned()
}

fn default_stack_file() -> String {
    "wwt_stacks.json".to_owned()
}

fn default_versions_file() -> String {
    "version.stkevt3.json".to_owned()
}

fn default_milky_way_file() -> String {
    "wwt_mw.json".to_owned()
}

fn default_csc11_file() -> String {
    "csc1.json.gz".to_owned()
}

fn default_xmm_file() -> String {
    "xmm.json.gz".to_owned()
}

fn default_chs_file() -> String {
    "chs.json".to_owned()
}

fn default_start_ra() -> f64 {
    ViewState::default().ra
}

fn default_start_dec() -> f64 {
    ViewState::default().dec
}

fn default_start_fov() -> f64 {
    ViewState::default().fov
}

fn default_nearby_stack_arcmin() -> f64 {
    DEFAULT_NEARBY_STACK_ARCMIN
}

fn default_nearby_source_count() -> usize {
    DEFAULT_NEARBY_SOURCE_COUNT
}

fn default_lookup_url() -> String {
    LOOKUP_URL.to_owned()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_persist_interval() -> u64 {
    2
}

fn default_init_timeout() -> u64 {
    10
}

fn default_init_attempts() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            data_url: default_data_url(),
            chunk_count: default_chunk_count(),
            chunk_pattern: default_chunk_pattern(),
            status_file: default_status_file(),
            stack_file: default_stack_file(),
            versions_file: default_versions_file(),
            milky_way_file: default_milky_way_file(),
            csc11_file: default_csc11_file(),
            xmm_file: default_xmm_file(),
            chs_file: default_chs_file(),
            start_ra: default_start_ra(),
            start_dec: default_start_dec(),
            start_fov: default_start_fov(),
            nearby_stack_arcmin: default_nearby_stack_arcmin(),
            nearby_source_count: default_nearby_source_count(),
            csc20_style: StyleOverride::default(),
            csc11_style: StyleOverride::default(),
            xmm_style: StyleOverride::default(),
            lookup_url: default_lookup_url(),
            request_timeout_secs: default_request_timeout(),
            cache_downloads: true,
            persist_interval_secs: default_persist_interval(),
            init_timeout_secs: default_init_timeout(),
            init_attempts: default_init_attempts(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, "config")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, "config")
    }

    /// File name of a single-file catalog.
    #[must_use]
    pub fn catalog_file(&self, kind: CatalogKind) -> Option<&str> {
        match kind {
            CatalogKind::Csc20 => None,
            CatalogKind::Csc11 => Some(&self.csc11_file),
            CatalogKind::Xmm => Some(&self.xmm_file),
            CatalogKind::Chs => Some(&self.chs_file),
        }
    }

    #[must_use]
    pub fn style_override(&self, kind: CatalogKind) -> Option<&StyleOverride> {
        match kind {
            CatalogKind::Csc20 => Some(&self.csc20_style),
            CatalogKind::Csc11 => Some(&self.csc11_style),
            CatalogKind::Xmm => Some(&self.xmm_style),
            CatalogKind::Chs => None,
        }
    }

    #[must_use]
    pub fn start_view(&self) -> ViewState {
        let default = ViewState::default();
        match default.zoomed(self.start_fov) {
            Some(view)
                if self.start_ra.is_finite() && (-90.0..=90.0).contains(&self.start_dec) =>
            {
                ViewState {
                    ra: self.start_ra.rem_euclid(360.0),
                    dec: self.start_dec,
                    ..view
                }
            }
            _ => {
                log::warn!("Ignoring invalid start location in config");
                default
            }
        }
    }

    /// Viewer tunables taken from this configuration.
    #[must_use]
    pub fn viewer_settings(&self) -> ViewerSettings {
        ViewerSettings {
            start: self.start_view(),
            nearby_stack_arcmin: self.nearby_stack_arcmin,
            nearby_source_count: self.nearby_source_count,
            chunk_count: self.chunk_count.max(1),
            init_timeout: Duration::from_secs(self.init_timeout_secs),
            init_attempts: self.init_attempts.max(1),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs.max(1))
    }
}

/// Parse a configured color override, ignoring names the viewer does not
/// know.
#[must_use]
pub fn parse_color(name: &str) -> Option<Color> {
    let color = Color::parse(name);
    if color.is_none() {
        log::warn!("Ignoring unknown color {name} in config");
    }
    color
}
