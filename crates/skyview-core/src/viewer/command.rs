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

//! Commands accepted by the viewer and the messages it hands back.

use std::fmt;
use std::time::Duration;

use crate::catalog::{CatalogKind, Generation, DEFAULT_CHUNK_COUNT};
use crate::init::DEFAULT_INIT_TIMEOUT;
use crate::render::Color;
use crate::samp::ConeColumns;
use crate::selection::{SelectionMode, DEFAULT_NEARBY_SOURCE_COUNT, DEFAULT_NEARBY_STACK_ARCMIN};
use crate::view::{ViewState, ZoomAction};

/// A change to a catalog's marker style.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleChange {
    Color(Color),
    /// Marker radius in arc-seconds.
    Size(f64),
}

/// A user intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ShowCatalog(CatalogKind),
    HideCatalog(CatalogKind),
    ToggleCatalog(CatalogKind),
    /// Recompute the shown sources for the current view.
    RefreshCatalog(CatalogKind),
    ToggleStacks,
    ToggleMilkyWay,
    SetMode(SelectionMode),
    Click { ra: f64, dec: f64 },
    SetStyle { kind: CatalogKind, change: StyleChange },
    Goto { ra: f64, dec: f64, fov: f64 },
    Zoom(ZoomAction),
    ResetLocation,
    SetNearbyStacks(bool),
    SetNearbySources(bool),
    FinishPolygon,
    ClearPolygon,
    ClearNearestStack,
    ClearNearestSource,
    FindNearestStack,
    ZoomToStack(String),
    ZoomToSource(String),
    FindTarget(String),
    SetImage(String),
    /// Send the sources in the shown field to SAMP clients.
    SendSources(ConeColumns),
    SendSourceProperties(String),
    SendStackEvents(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.text)
    }
}

/// Work the front end has to perform on the viewer's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Fetch chunks `1..=count` of the primary catalog.
    FetchChunks { generation: Generation, count: usize },
    /// Fetch a single-file catalog.
    FetchCatalog(CatalogKind),
    FetchMilkyWay,
    /// Resolve a name with the lookUP service.
    Lookup(String),
}

/// Why a fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The server answered with an error status.
    Status(u16),
    /// The request could not complete.
    Network(String),
    /// The payload could not be decoded.
    Decode(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "the server responded with status {code}"),
            Self::Network(msg) => write!(f, "the request could not be completed ({msg})"),
            Self::Decode(msg) => write!(f, "the response could not be read ({msg})"),
        }
    }
}

/// Tunables of the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSettings {
    pub start: ViewState,
    /// Radius of the nearby-stack search, in arc-minutes.
    pub nearby_stack_arcmin: f64,
    pub nearby_source_count: usize,
    pub chunk_count: usize,
    pub init_timeout: Duration,
    pub init_attempts: u32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            start: ViewState::default(),
            nearby_stack_arcmin: DEFAULT_NEARBY_STACK_ARCMIN,
            nearby_source_count: DEFAULT_NEARBY_SOURCE_COUNT,
            chunk_count: DEFAULT_CHUNK_COUNT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            init_attempts: 3,
        }
    }
}
