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

//! Sky viewer core for exploring the Chandra Source Catalog.
//!
//! This library holds everything a front end needs to drive an interactive
//! sky display, without doing any rendering or I/O itself:
//!
//! - **Coordinates**: sexagesimal parsing and formatting, great-circle
//!   separation
//! - **Catalogs**: the chunked primary catalog, comparison catalogs, and
//!   hull outlines, with the overlays that draw them
//! - **Stacks**: footprints decoded from stack identifiers, processing status
//! - **Selection**: click dispatch, nearest stack and source, region polygons
//! - **Viewer**: the coordinator tying it all together
//!
//! The sky engine is reached through the [`Renderer`] trait, SAMP through
//! [`MessageBus`], and persistent settings through [`KeyValueStore`].
//!
//! # Quick Start
//!
//! ```no_run
//! use skyview_core::{
//!     CatalogKind, Command, MemoryRenderer, MemoryStore, NullBus, Request, ViewState,
//!     Viewer, ViewerSettings,
//! };
//! use std::time::Instant;
//!
//! let renderer = MemoryRenderer::new(ViewState::default());
//! let mut viewer = Viewer::new(renderer, MemoryStore::new(), NullBus, ViewerSettings::default());
//! viewer.start(Instant::now());
//! viewer.renderer_ready();
//!
//! viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
//! for request in viewer.take_requests() {
//!     if let Request::FetchChunks { generation, count } = request {
//!         for index in 1..=count {
//!             let body = std::fs::read_to_string(format!("wwt_srcprop.{index}.json")).unwrap();
//!             viewer.chunk_completed(generation, index, Ok(body));
//!         }
//!     }
//! }
//!
//! for notice in viewer.take_notices() {
//!     println!("{notice}");
//! }
//! ```
//!
//! # Using Individual Pieces
//!
//! ```
//! use skyview_core::coords::{parse_position, separation};
//! use skyview_core::stacks::decode_stack_name;
//!
//! let (ra, dec) = decode_stack_name("acisfJ0618409m705956_001").unwrap();
//! let (ra0, dec0) = parse_position("6:18:40.9, -70:59:56").unwrap();
//! assert!(separation(ra, dec, ra0, dec0) < 1e-3);
//! ```

pub mod activity;
pub mod catalog;
pub mod coords;
pub mod init;
pub mod lookup;
pub mod nearest;
pub mod overlay;
pub mod render;
pub mod samp;
pub mod selection;
pub mod stacks;
pub mod storage;
pub mod view;
pub mod viewer;

pub use catalog::{CatalogKind, CatalogStyle, SourceProperties};
pub use coords::{format_position, parse_dec, parse_position, parse_ra, separation};
pub use lookup::{classify_target, LookupOutcome, Target};
pub use render::{Color, MemoryRenderer, Renderer, ShapeId, ShapeSpec, ShapeStyle};
pub use samp::{ConeColumns, MessageBus, NullBus, SampMessage};
pub use selection::SelectionMode;
pub use stacks::{StackRecord, StackStatus, StackTable};
pub use storage::{KeyValueStore, MemoryStore};
pub use view::{Bookmark, ViewState, ZoomAction};
pub use viewer::{
    Command, FetchFailure, Notice, NoticeLevel, Request, StyleChange, Viewer, ViewerSettings,
};
