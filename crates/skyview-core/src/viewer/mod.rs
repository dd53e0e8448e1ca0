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

//! The viewer coordinator.
//!
//! [`Viewer`] owns every piece of application state: catalogs and their
//! overlays, the stack table, the click dispatcher and highlights, the
//! chunked loader, the busy counter, and the initialization state. Front
//! ends feed it [`Command`]s and the results of the fetches it asks for,
//! and drain the [`Notice`]s and [`Request`]s it queues. It performs no I/O
//! itself.

mod command;

pub use command::{
    Command, FetchFailure, Notice, NoticeLevel, Request, StyleChange, ViewerSettings,
};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::Instant;

use log::{debug, error, info, trace, warn};

use crate::activity::BusyCounter;
use crate::catalog::{
    parse_chs, parse_csc11, parse_xmm, schema, CatalogData, CatalogKind, CatalogState,
    CatalogStore, ChunkOutcome, ChunkPayload, ChunkedLoader, Generation, PlotData,
    SourceProperties,
};
use crate::coords::format_position;
use crate::init::{InitAction, InitState, Initializer};
use crate::lookup::{classify_target, parse_lookup_response, LookupError, LookupOutcome, Target};
use crate::nearest::Neighbor;
use crate::overlay::{CatalogOverlay, MilkyWayOverlay, ShowOutcome, StackOverlay};
use crate::render::Renderer;
use crate::samp::{ConeColumns, MessageBus, SampMessage};
use crate::selection::{
    nearby_sources, nearby_stacks, nearest_source, nearest_stack, ClickDispatcher,
    PolygonBuilder, SelectionMode, SourceHighlight, StackHighlight,
};
use crate::stacks::{StackError, StackTable, StackVersions, StatusPayload, StatusSummary};
use crate::storage::KeyValueStore;
use crate::view::{image_layer, Bookmark, Foreground, ViewState, FOREGROUND_KEY, LOCATION_KEY};

/// Field of view used when moving to a searched target.
pub const TARGET_FOV: f64 = 5.0;
/// Field of view used when zooming to a stack.
pub const STACK_FOV: f64 = 1.0;
/// Field of view used when zooming to a source.
pub const SOURCE_FOV: f64 = 0.06;

/// The stack nearest to the last stack-mode click.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSelection {
    pub id: String,
    pub separation: f64,
    pub nearby: Vec<Neighbor<String>>,
}

/// The source nearest to the last source-mode click.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSelection {
    pub row: usize,
    pub separation: f64,
    pub properties: SourceProperties,
    pub nearby: Vec<Neighbor<usize>>,
}

pub struct Viewer<R: Renderer> {
    renderer: R,
    store: Box<dyn KeyValueStore + Send>,
    bus: Box<dyn MessageBus + Send>,
    settings: ViewerSettings,

    catalogs: CatalogStore,
    overlays: BTreeMap<CatalogKind, CatalogOverlay>,
    loader: ChunkedLoader,
    pending_catalogs: BTreeSet<CatalogKind>,
    plot_data: Option<PlotData>,

    stacks: StackTable,
    versions: Option<StackVersions>,
    stack_overlay: Option<StackOverlay>,
    milky_way: Option<MilkyWayOverlay>,
    milky_way_requested: bool,

    dispatcher: ClickDispatcher,
    stack_highlight: StackHighlight,
    source_highlight: SourceHighlight,
    selected_stack: Option<StackSelection>,
    selected_source: Option<SourceSelection>,
    polygon: PolygonBuilder,
    finished_polygon: Option<Vec<(f64, f64)>>,
    show_nearby_stacks: bool,
    show_nearby_sources: bool,

    busy: BusyCounter,
    init: Initializer,
    bookmark: Option<Bookmark>,
    persisted_view: Option<ViewState>,
    target_label: Option<String>,
    requests: Vec<Request>,
    notices: VecDeque<Notice>,
    trace_counter: u32,
}

impl<R: Renderer + fmt::Debug> fmt::Debug for Viewer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("renderer", &self.renderer)
            .field("init", &self.init.state())
            .field("mode", &self.dispatcher.mode())
            .field("stacks", &self.stacks.len())
            .field("busy", &self.busy.count())
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> Viewer<R> {
    pub fn new<S, B>(renderer: R, store: S, bus: B, settings: ViewerSettings) -> Self
    where
        S: KeyValueStore + Send + 'static,
        B: MessageBus + Send + 'static,
    {
        let init = Initializer::new(settings.init_timeout, settings.init_attempts);
        Self {
            renderer,
            store: Box::new(store),
            bus: Box::new(bus),
            settings,
            catalogs: CatalogStore::new(),
            overlays: BTreeMap::new(),
            loader: ChunkedLoader::new(),
            pending_catalogs: BTreeSet::new(),
            plot_data: None,
            stacks: StackTable::default(),
            versions: None,
            stack_overlay: None,
            milky_way: None,
            milky_way_requested: false,
            dispatcher: ClickDispatcher::default(),
            stack_highlight: StackHighlight::default(),
            source_highlight: SourceHighlight::default(),
            selected_stack: None,
            selected_source: None,
            polygon: PolygonBuilder::default(),
            finished_polygon: None,
            show_nearby_stacks: false,
            show_nearby_sources: false,
            busy: BusyCounter::default(),
            init,
            bookmark: None,
            persisted_view: None,
            target_label: None,
            requests: Vec::new(),
            notices: VecDeque::new(),
            trace_counter: 1,
        }
    }

    // Accessors

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[must_use]
    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.dispatcher.mode()
    }

    #[must_use]
    pub fn init_state(&self) -> InitState {
        self.init.state()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    #[must_use]
    pub fn catalog(&self, kind: CatalogKind) -> &CatalogState {
        self.catalogs.get(kind)
    }

    #[must_use]
    pub fn overlay(&self, kind: CatalogKind) -> Option<&CatalogOverlay> {
        self.overlays.get(&kind)
    }

    #[must_use]
    pub fn is_shown(&self, kind: CatalogKind) -> bool {
        self.overlays.get(&kind).is_some_and(CatalogOverlay::is_shown)
    }

    #[must_use]
    pub fn stacks(&self) -> &StackTable {
        &self.stacks
    }

    #[must_use]
    pub fn stacks_shown(&self) -> bool {
        self.stack_overlay.as_ref().is_some_and(StackOverlay::is_shown)
    }

    #[must_use]
    pub fn milky_way_shown(&self) -> bool {
        self.milky_way.as_ref().is_some_and(MilkyWayOverlay::is_shown)
    }

    #[must_use]
    pub fn selected_stack(&self) -> Option<&StackSelection> {
        self.selected_stack.as_ref()
    }

    #[must_use]
    pub fn selected_source(&self) -> Option<&SourceSelection> {
        self.selected_source.as_ref()
    }

    #[must_use]
    pub fn plot_data(&self) -> Option<&PlotData> {
        self.plot_data.as_ref()
    }

    #[must_use]
    pub fn polygon_vertices(&self) -> usize {
        self.polygon.vertex_count()
    }

    #[must_use]
    pub fn finished_polygon(&self) -> Option<&[(f64, f64)]> {
        self.finished_polygon.as_deref()
    }

    #[must_use]
    pub fn target_label(&self) -> Option<&str> {
        self.target_label.as_deref()
    }

    /// Primary catalog rows currently shown, with their row index.
    #[must_use]
    pub fn shown_sources(&self) -> Vec<(usize, SourceProperties)> {
        let (Some(rows), Some(overlay)) = (
            self.catalogs.get(CatalogKind::Csc20).rows(),
            self.overlays.get(&CatalogKind::Csc20),
        ) else {
            return Vec::new();
        };
        overlay
            .shown_rows()
            .iter()
            .filter_map(|i| Some((*i, SourceProperties::from_row(rows.get(*i)?))))
            .collect()
    }

    /// Bookmark describing the current view.
    #[must_use]
    pub fn bookmark(&self) -> Bookmark {
        Bookmark {
            display: self.store.get(FOREGROUND_KEY),
            stack_id: self.selected_stack.as_ref().map(|s| s.id.clone()),
            ..Bookmark::from_view(self.renderer.view())
        }
    }

    /// Position to apply once the renderer is ready.
    pub fn set_bookmark(&mut self, bookmark: Bookmark) {
        self.bookmark = Some(bookmark);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    fn trace(&mut self, msg: &str) {
        trace!("TRACE[{}] {msg}", self.trace_counter);
        self.trace_counter += 1;
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let notice = Notice {
            level,
            text: text.into(),
        };
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{notice}"),
            NoticeLevel::Warning | NoticeLevel::Error => warn!("{notice}"),
        }
        self.notices.push_back(notice);
    }

    // Lifecycle

    /// Begin renderer initialization. The returned action tells the front
    /// end to set up the renderer.
    pub fn start(&mut self, now: Instant) -> InitAction {
        self.trace("initialize");
        self.init.begin(now)
    }

    /// The renderer reported that it is ready. Returns `true` the first
    /// time only.
    pub fn renderer_ready(&mut self) -> bool {
        if self.init.ready() != InitAction::RunReady {
            return false;
        }
        self.on_ready();
        true
    }

    /// Periodic housekeeping: initialization timeouts and view persistence.
    pub fn tick(&mut self, now: Instant) -> InitAction {
        let action = self.init.tick(now);
        match action {
            InitAction::Restart(attempt) => {
                self.trace(&format!("restarting setup (attempt {attempt})"));
            }
            InitAction::GiveUp => {
                self.notify(
                    NoticeLevel::Error,
                    "The sky viewer could not be initialized.",
                );
            }
            InitAction::None | InitAction::RunReady => {}
        }

        if self.init.is_ready() {
            self.persist_view();
        }
        action
    }

    fn on_ready(&mut self) {
        self.trace("in ready handler");

        if !self.stacks.is_empty() && self.stack_overlay.is_none() {
            self.stack_overlay = Some(StackOverlay::build(&self.stacks, &mut self.renderer));
            self.trace("Added FOV");
        }

        if let Some(image) = self.store.get(FOREGROUND_KEY) {
            self.apply_image(&image);
        }

        let base = self
            .store
            .get(LOCATION_KEY)
            .and_then(|text| match ViewState::from_json(&text) {
                Ok(view) => Some(view),
                Err(e) => {
                    warn!("Ignoring stored location: {e}");
                    None
                }
            })
            .unwrap_or(self.settings.start);

        let bookmark = self.bookmark.take();
        let view = bookmark.as_ref().map_or(base, |b| b.apply_to(base));
        self.renderer.goto(view.ra, view.dec, view.fov, false);
        self.persisted_view = Some(view);
        self.trace("Set up zoom to starting location");

        if let Some(bookmark) = bookmark {
            if let Some(display) = &bookmark.display {
                self.apply_image(display);
            }
            if let Some(stack) = bookmark.stack_id.as_ref().and_then(|id| self.stacks.get(id)) {
                let (ra, dec) = (stack.ra, stack.dec);
                self.select_stack_at(ra, dec);
            }
        }

        self.trace("Finished ready handler");
    }

    /// Store the current view if it moved since the last save.
    pub fn persist_view(&mut self) -> bool {
        let view = self.renderer.view();
        if self
            .persisted_view
            .is_some_and(|last| !view.differs_from(&last))
        {
            return false;
        }
        match view.to_json() {
            Ok(text) => {
                self.store.set(LOCATION_KEY, &text);
                self.persisted_view = Some(view);
                true
            }
            Err(e) => {
                error!("internal error: unable to serialize view: {e}");
                false
            }
        }
    }

    // Data arrivals

    /// Install the stack table. Footprints are drawn once the renderer is
    /// ready.
    pub fn load_stacks(&mut self, text: &str) -> Result<(), StackError> {
        if !self.stacks.is_empty() {
            warn!("Stack table already loaded, ignoring");
            return Ok(());
        }
        self.stacks = StackTable::from_json(text)?;
        self.trace("recoded positions");
        if self.init.is_ready() {
            self.stack_overlay = Some(StackOverlay::build(&self.stacks, &mut self.renderer));
        }
        Ok(())
    }

    /// Apply the processing-status document.
    pub fn apply_status(&mut self, text: &str) -> Result<StatusSummary, StackError> {
        let payload = StatusPayload::from_json(text)?;
        let summary = self.stacks.apply_status(&payload);
        match self.stacks.chunk_count() {
            Some(0) => warn!("Ignoring a chunk count of zero in the processing status"),
            Some(chunks) => {
                debug!("Status sets the chunk count to {chunks}");
                self.settings.chunk_count = chunks;
            }
            None => {}
        }

        self.stack_highlight.clear(&mut self.renderer);
        if let Some(overlay) = &self.stack_overlay {
            overlay.restyle(&self.stacks, &mut self.renderer);
        }
        if let Some(selected) = self.selected_stack.take() {
            if let Some(stack) = self.stacks.get(&selected.id) {
                let (ra, dec) = (stack.ra, stack.dec);
                self.select_stack_at(ra, dec);
            }
        }
        self.trace(" - updatedCompletionInfo");
        Ok(summary)
    }

    pub fn load_versions(&mut self, text: &str) -> Result<(), StackError> {
        let versions = StackVersions::from_json(text)?;
        info!("Loaded event file versions for {} stacks", versions.len());
        self.versions = Some(versions);
        Ok(())
    }

    /// A chunk of the primary catalog arrived (or failed).
    pub fn chunk_completed(
        &mut self,
        generation: Generation,
        index: usize,
        body: Result<String, FetchFailure>,
    ) {
        if self.loader.current_generation() != Some(generation) {
            debug!("Ignoring chunk {index} of {generation}");
            return;
        }

        let outcome = match body {
            Ok(text) => ChunkPayload::from_json(&text)
                .and_then(|chunk| self.loader.accept(generation, index, chunk)),
            Err(failure) => {
                warn!("Unable to download catalog chunk {index}: {failure}");
                self.loader.abort();
                self.busy.stop();
                let label = self.catalogs.get(CatalogKind::Csc20).label().to_owned();
                self.notify(
                    NoticeLevel::Error,
                    format!("Unable to load the {label} catalog: {failure}"),
                );
                return;
            }
        };

        match outcome {
            Ok(ChunkOutcome::Complete(rows)) => {
                self.busy.stop();
                self.install_catalog(CatalogKind::Csc20, CatalogData::Sources(rows), None);
            }
            Ok(ChunkOutcome::Pending { received, expected }) => {
                debug!("Catalog chunks received: {received}/{expected}");
            }
            Ok(ChunkOutcome::Stale | ChunkOutcome::Duplicate) => {}
            Err(e) => {
                self.loader.abort();
                self.busy.stop();
                let label = self.catalogs.get(CatalogKind::Csc20).label().to_owned();
                self.notify(
                    NoticeLevel::Error,
                    format!("The {label} catalog could not be loaded: {e}"),
                );
            }
        }
    }

    /// A single-file catalog arrived (or failed).
    pub fn catalog_completed(&mut self, kind: CatalogKind, body: Result<String, FetchFailure>) {
        if !self.pending_catalogs.remove(&kind) {
            debug!("Ignoring unrequested {kind} catalog");
            return;
        }
        self.busy.stop();

        let text = match body {
            Ok(text) => text,
            Err(failure) => {
                let label = self.catalogs.get(kind).label().to_owned();
                self.notify(
                    NoticeLevel::Error,
                    format!("Unable to load the {label} catalog: {failure}"),
                );
                return;
            }
        };

        let decoded = match kind {
            CatalogKind::Csc11 => parse_csc11(&text).map(|s| (CatalogData::Comparison(s), None)),
            CatalogKind::Xmm => {
                parse_xmm(&text).map(|(label, s)| (CatalogData::Comparison(s), Some(label)))
            }
            CatalogKind::Chs => parse_chs(&text).map(|h| (CatalogData::Hulls(h), None)),
            CatalogKind::Csc20 => {
                error!("internal error: the primary catalog is loaded in chunks");
                return;
            }
        };

        match decoded {
            Ok((data, label)) => self.install_catalog(kind, data, label),
            Err(e) => {
                let label = self.catalogs.get(kind).label().to_owned();
                self.notify(
                    NoticeLevel::Error,
                    format!("Unable to load the {label} catalog: {e}"),
                );
            }
        }
    }

    fn install_catalog(&mut self, kind: CatalogKind, data: CatalogData, label: Option<String>) {
        let state = self.catalogs.get_mut(kind);
        if let Err(e) = state.set_data(data, label) {
            error!("internal error: {e}");
            return;
        }
        match CatalogOverlay::build(self.catalogs.get(kind), &mut self.renderer) {
            Ok(overlay) => {
                self.overlays.insert(kind, overlay);
            }
            Err(e) => {
                error!("internal error: {e}");
                return;
            }
        }
        let label = self.catalogs.get(kind).label().to_owned();
        self.trace(&format!("Created {kind} annotations"));
        self.notify(NoticeLevel::Success, format!("{label} sources loaded."));
        self.show_catalog(kind);
    }

    pub fn milky_way_completed(&mut self, body: Result<String, FetchFailure>) {
        if !self.milky_way_requested {
            debug!("Ignoring unrequested Milky Way outline");
            return;
        }
        self.milky_way_requested = false;
        self.busy.stop();

        let result = body.map(|text| MilkyWayOverlay::from_geojson(&text, &mut self.renderer));
        match result {
            Ok(Ok(mut overlay)) => {
                overlay.toggle(&mut self.renderer);
                self.milky_way = Some(overlay);
                self.trace("Added MW");
            }
            Ok(Err(e)) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Unable to parse the Milky Way outline: {e}"),
                );
            }
            Err(failure) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Unable to load the Milky Way outline: {failure}"),
                );
            }
        }
    }

    /// The lookUP service answered (or failed) for `name`.
    pub fn lookup_completed(&mut self, name: &str, body: Result<String, FetchFailure>) {
        self.busy.stop();

        let text = match body {
            Ok(text) => text,
            Err(failure) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("There was a problem calling the lookUP service: {failure}"),
                );
                return;
            }
        };

        match parse_lookup_response(name, &text) {
            Ok(LookupOutcome::Found {
                ra,
                dec,
                service,
                category,
            }) => {
                self.set_position(ra, dec, name.to_owned(), TARGET_FOV);
                let mut msg = match service {
                    Some(service) => format!("Location provided for {name} by {service}."),
                    None => "Location found.".to_owned(),
                };
                if let Some(category) = category.filter(|c| !c.avmcode.is_empty()) {
                    msg.push_str(&format!(" Source category: {}", category.avmdesc));
                }
                self.notify(NoticeLevel::Success, msg);
            }
            Ok(outcome) => self.notify(NoticeLevel::Error, outcome.to_string()),
            Err(LookupError::Service) => self.notify(
                NoticeLevel::Error,
                "There was a problem querying the lookUP service.",
            ),
            Err(e) => {
                warn!("Bad lookUP response for {name}: {e}");
                self.notify(
                    NoticeLevel::Error,
                    "There was a problem querying the lookUP service.",
                );
            }
        }
    }

    // Commands

    pub fn dispatch(&mut self, command: Command) {
        debug!("dispatch {command:?}");
        match command {
            Command::ShowCatalog(kind) => self.show_catalog(kind),
            Command::HideCatalog(kind) => self.hide_catalog(kind),
            Command::ToggleCatalog(kind) => {
                if self.is_shown(kind) {
                    self.hide_catalog(kind);
                } else {
                    self.show_catalog(kind);
                }
            }
            Command::RefreshCatalog(kind) => {
                if self.is_shown(kind) {
                    self.hide_catalog(kind);
                }
                self.show_catalog(kind);
            }
            Command::ToggleStacks => self.toggle_stacks(),
            Command::ToggleMilkyWay => self.toggle_milky_way(),
            Command::SetMode(mode) => self.set_mode(mode),
            Command::Click { ra, dec } => self.click(ra, dec),
            Command::SetStyle { kind, change } => self.set_style(kind, change),
            Command::Goto { ra, dec, fov } => self.goto(ra, dec, fov),
            Command::Zoom(action) => {
                let view = self.renderer.view();
                match view.apply(action) {
                    Some(v) => self.renderer.goto(v.ra, v.dec, v.fov, false),
                    None => debug!("Ignoring out-of-range zoom {action:?}"),
                }
            }
            Command::ResetLocation => {
                self.target_label = None;
                let start = self.settings.start;
                self.renderer.goto(start.ra, start.dec, start.fov, false);
            }
            Command::SetNearbyStacks(flag) => self.show_nearby_stacks = flag,
            Command::SetNearbySources(flag) => self.show_nearby_sources = flag,
            Command::FinishPolygon => self.finish_polygon(),
            Command::ClearPolygon => {
                self.polygon.clear(&mut self.renderer);
                self.finished_polygon = None;
                let mode = if self.is_shown(CatalogKind::Csc20) {
                    SelectionMode::Source
                } else {
                    SelectionMode::Stack
                };
                self.dispatcher.bind(mode);
            }
            Command::ClearNearestStack => self.clear_nearest_stack(),
            Command::ClearNearestSource => self.clear_nearest_source(),
            Command::FindNearestStack => {
                let view = self.renderer.view();
                self.select_stack_at(view.ra, view.dec);
            }
            Command::ZoomToStack(id) => match self.stacks.get(&id) {
                Some(stack) => {
                    let (ra, dec) = (stack.ra, stack.dec);
                    self.move_to(ra, dec, STACK_FOV);
                }
                None => self.notify(NoticeLevel::Warning, format!("Unknown stack {id}")),
            },
            Command::ZoomToSource(name) => match self.find_source(&name) {
                Some((ra, dec)) => self.move_to(ra, dec, SOURCE_FOV),
                None => self.notify(NoticeLevel::Warning, format!("Unknown source {name}")),
            },
            Command::FindTarget(text) => self.find_target(&text),
            Command::SetImage(name) => {
                self.apply_image(&name);
            }
            Command::SendSources(columns) => self.send_sources(columns),
            Command::SendSourceProperties(name) => {
                self.send_samp(SampMessage::source_properties(&name));
            }
            Command::SendStackEvents(id) => {
                match self.versions.as_ref().and_then(|v| v.get(&id)) {
                    Some(version) => self.send_samp(SampMessage::stack_event_file(&id, version)),
                    None => self.notify(
                        NoticeLevel::Warning,
                        format!("No event file is known for stack {id}"),
                    ),
                }
            }
        }
    }

    fn request_catalog(&mut self, kind: CatalogKind) {
        let label = self.catalogs.get(kind).label().to_owned();
        if kind == CatalogKind::Csc20 {
            if self.loader.is_loading() {
                debug!("{label} already loading");
                return;
            }
            let count = self.settings.chunk_count;
            let generation = self.loader.begin(count);
            self.requests.push(Request::FetchChunks { generation, count });
        } else {
            if !self.pending_catalogs.insert(kind) {
                debug!("{label} already requested");
                return;
            }
            self.requests.push(Request::FetchCatalog(kind));
        }
        self.busy.start();
        self.notify(NoticeLevel::Info, format!("Loading {label} sources"));
    }

    fn show_catalog(&mut self, kind: CatalogKind) {
        if !self.catalogs.get(kind).is_loaded() {
            self.request_catalog(kind);
            return;
        }
        let Some(overlay) = self.overlays.get_mut(&kind) else {
            error!("internal error: show {kind} called with no annotations");
            return;
        };

        match overlay.show(&mut self.renderer) {
            ShowOutcome::Shown(_) if kind == CatalogKind::Csc20 => {
                self.plot_data = Some(PlotData::from_sources(
                    &self
                        .shown_sources()
                        .into_iter()
                        .map(|(_, src)| src)
                        .collect::<Vec<_>>(),
                ));
                self.dispatcher.bind(SelectionMode::Source);
            }
            ShowOutcome::Shown(_) | ShowOutcome::AlreadyShown => {}
            ShowOutcome::Empty => {
                let label = self.catalogs.get(kind).label().to_owned();
                self.notify(
                    NoticeLevel::Info,
                    format!("No {label} sources found in this area of the sky."),
                );
            }
        }
    }

    fn hide_catalog(&mut self, kind: CatalogKind) {
        if kind == CatalogKind::Csc20 {
            self.hide_primary();
            return;
        }
        match self.overlays.get_mut(&kind) {
            Some(overlay) => {
                overlay.hide(&mut self.renderer);
            }
            None => warn!("hide {kind} called when no data exists"),
        }
    }

    /// Hide the primary catalog and leave source mode.
    fn hide_primary(&mut self) {
        if let Some(overlay) = self.overlays.get_mut(&CatalogKind::Csc20) {
            if overlay.is_shown() {
                overlay.hide(&mut self.renderer);
            }
        }
        self.clear_nearest_source();
        self.plot_data = None;
        if self.dispatcher.mode() == SelectionMode::Source {
            self.dispatcher.bind(SelectionMode::Stack);
        }
    }

    fn toggle_stacks(&mut self) {
        match self.stack_overlay.as_mut() {
            Some(overlay) => {
                overlay.toggle(&mut self.renderer);
            }
            None => warn!("toggle stacks called before the footprints exist"),
        }
        self.clear_nearest_stack();
    }

    fn toggle_milky_way(&mut self) {
        if let Some(overlay) = self.milky_way.as_mut() {
            overlay.toggle(&mut self.renderer);
            return;
        }
        if !self.milky_way_requested {
            self.milky_way_requested = true;
            self.requests.push(Request::FetchMilkyWay);
            self.busy.start();
        }
    }

    fn set_mode(&mut self, mode: SelectionMode) {
        if mode == SelectionMode::Source && !self.is_shown(CatalogKind::Csc20) {
            let label = self.catalogs.get(CatalogKind::Csc20).label().to_owned();
            self.notify(
                NoticeLevel::Warning,
                format!("The {label} sources must be shown before selecting sources."),
            );
            return;
        }
        self.dispatcher.bind(mode);
    }

    fn click(&mut self, ra: f64, dec: f64) {
        let ra = if ra < 0.0 { ra + 360.0 } else { ra };
        match self.dispatcher.mode() {
            SelectionMode::Stack => self.select_stack_at(ra, dec),
            SelectionMode::Source => self.select_source_at(ra, dec),
            SelectionMode::Polygon => {
                let count = self.polygon.add_vertex(&mut self.renderer, ra, dec);
                self.finished_polygon = None;
                self.notify(NoticeLevel::Info, format!("Polygon has {count} vertices"));
            }
            SelectionMode::Point => {
                let fov = self.renderer.view().fov;
                self.renderer.goto(ra, dec, fov, false);
            }
            SelectionMode::None => {}
        }
    }

    fn select_stack_at(&mut self, ra: f64, dec: f64) {
        self.clear_nearest_stack();

        let max_sep = self.renderer.view().fov;
        let Some(found) = nearest_stack(&self.stacks, ra, dec, max_sep) else {
            debug!("No stack within {max_sep} degrees of {ra} {dec}");
            return;
        };

        let nearby = if self.show_nearby_stacks {
            nearby_stacks(&self.stacks, &found.item, self.settings.nearby_stack_arcmin / 60.0)
        } else {
            Vec::new()
        };

        if let Some(overlay) = &self.stack_overlay {
            self.stack_highlight
                .select(&mut self.renderer, overlay.shapes(&found.item));
            for neighbor in &nearby {
                self.stack_highlight
                    .add_nearby(&mut self.renderer, overlay.shapes(&neighbor.item));
            }
        }

        self.selected_stack = Some(StackSelection {
            id: found.item,
            separation: found.separation,
            nearby,
        });
    }

    fn select_source_at(&mut self, ra: f64, dec: f64) {
        self.clear_nearest_source();

        let (Some(rows), Some(overlay)) = (
            self.catalogs.get(CatalogKind::Csc20).rows(),
            self.overlays.get(&CatalogKind::Csc20),
        ) else {
            debug!("Source selection with no sources");
            return;
        };

        let Some(found) = nearest_source(rows, overlay.shown_rows(), ra, dec) else {
            return;
        };

        if let Some(annotation) = overlay.annotation(found.item) {
            self.source_highlight
                .select(&mut self.renderer, annotation.shape);
        }

        let nearby = if self.show_nearby_sources {
            nearby_sources(
                rows,
                overlay.shown_rows(),
                found.item,
                self.settings.nearby_source_count,
            )
        } else {
            Vec::new()
        };

        let properties = rows
            .get(found.item)
            .map(|row| SourceProperties::from_row(row))
            .unwrap_or_default();

        self.selected_source = Some(SourceSelection {
            row: found.item,
            separation: found.separation,
            properties,
            nearby,
        });
    }

    fn clear_nearest_stack(&mut self) {
        self.stack_highlight.clear(&mut self.renderer);
        self.selected_stack = None;
    }

    fn clear_nearest_source(&mut self) {
        self.source_highlight.clear(&mut self.renderer);
        self.selected_source = None;
    }

    fn finish_polygon(&mut self) {
        match self.polygon.finish() {
            Some(vertices) => {
                let count = vertices.len();
                self.finished_polygon = Some(vertices.to_vec());
                self.notify(
                    NoticeLevel::Success,
                    format!("Region selected with {count} vertices"),
                );
            }
            None => self.notify(
                NoticeLevel::Warning,
                "A region needs at least three vertices.",
            ),
        }
    }

    fn set_style(&mut self, kind: CatalogKind, change: StyleChange) {
        if kind == CatalogKind::Chs {
            self.notify(
                NoticeLevel::Warning,
                "The CHS display properties can not be changed.",
            );
            return;
        }

        match change {
            StyleChange::Color(color) => {
                if kind == CatalogKind::Csc20 {
                    self.clear_nearest_source();
                }
                self.catalogs
                    .get_mut(kind)
                    .style_mut()
                    .set_color(color.clone());
                if let Some(overlay) = self.overlays.get(&kind) {
                    overlay.set_color(&mut self.renderer, &color);
                }
            }
            StyleChange::Size(arcsec) => {
                let style = self.catalogs.get_mut(kind).style_mut();
                if let Err(e) = style.set_size_arcsec(arcsec) {
                    self.notify(NoticeLevel::Warning, format!("Invalid source size: {e}"));
                    return;
                }
                let radius = style.size_deg;
                if let Some(overlay) = self.overlays.get(&kind) {
                    overlay.set_radius(&mut self.renderer, radius);
                }
            }
        }
    }

    fn goto(&mut self, ra: f64, dec: f64, fov: f64) {
        let valid = ra.is_finite()
            && (-90.0..=90.0).contains(&dec)
            && ViewState::default().zoomed(fov).is_some();
        if !valid {
            self.notify(
                NoticeLevel::Warning,
                format!("Invalid position: ra={ra} dec={dec} fov={fov}"),
            );
            return;
        }
        let ra = ra.rem_euclid(360.0);
        self.set_position(ra, dec, format_position(ra, dec), fov);
    }

    /// Move the view to a target: hides the primary sources, drops the
    /// stack selection, and tells SAMP clients.
    fn set_position(&mut self, ra: f64, dec: f64, label: String, fov: f64) {
        self.hide_primary();
        self.clear_nearest_stack();
        self.target_label = Some(label);
        self.move_to(ra, dec, fov);
    }

    fn move_to(&mut self, ra: f64, dec: f64, fov: f64) {
        self.renderer.goto(ra, dec, fov, false);
        if self.bus.is_connected() {
            self.bus.send(SampMessage::PointAtSky { ra, dec });
        }
    }

    fn find_source(&self, name: &str) -> Option<(f64, f64)> {
        self.catalogs
            .get(CatalogKind::Csc20)
            .rows()?
            .iter()
            .find(|row| {
                row.get(schema::NAME_COLUMN)
                    .and_then(|f| f.as_str())
                    .is_some_and(|n| n == name)
            })
            .and_then(|row| schema::row_position(row))
    }

    fn find_target(&mut self, text: &str) {
        let Some(target) = classify_target(text) else {
            debug!("Ignoring empty target");
            return;
        };

        let name = match target {
            Target::Position { ra, dec, label } => {
                self.set_position(ra, dec, label, TARGET_FOV);
                self.notify(
                    NoticeLevel::Success,
                    format!("Moving to {}", format_position(ra, dec)),
                );
                return;
            }
            Target::SourceName(name) => {
                if !self.catalogs.get(CatalogKind::Csc20).is_loaded() {
                    self.notify(
                        NoticeLevel::Error,
                        "The CSC 2.0 sources must be loaded before they can be used in a search.",
                    );
                    return;
                }
                if let Some((ra, dec)) = self.find_source(&name) {
                    self.set_position(ra, dec, name.clone(), TARGET_FOV);
                    self.notify(NoticeLevel::Success, format!("Moving to {name}"));
                    return;
                }
                name
            }
            Target::Name(name) => name,
        };

        if let Some(stack) = self.stacks.get(&name) {
            let (ra, dec) = (stack.ra, stack.dec);
            self.set_position(ra, dec, name.clone(), TARGET_FOV);
            self.notify(NoticeLevel::Success, format!("Moving to stack {name}"));
            return;
        }

        self.busy.start();
        self.notify(NoticeLevel::Info, format!("Searching for {name}"));
        self.requests.push(Request::Lookup(name));
    }

    /// Select a foreground image layer and remember the choice.
    fn apply_image(&mut self, name: &str) -> bool {
        match image_layer(name) {
            Ok(foreground) => {
                let image = match foreground {
                    Foreground::Background => None,
                    Foreground::Image(full) => Some(full),
                };
                self.renderer.set_foreground(image, foreground.opacity());
                self.store.set(FOREGROUND_KEY, name);
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    fn send_sources(&mut self, columns: ConeColumns) {
        let Some(view) = self
            .overlays
            .get(&CatalogKind::Csc20)
            .and_then(CatalogOverlay::shown_view)
        else {
            self.notify(
                NoticeLevel::Warning,
                "Show the sources before sending them to SAMP clients.",
            );
            return;
        };
        self.send_samp(SampMessage::cone_search(view.ra, view.dec, view.fov, columns));
    }

    fn send_samp(&mut self, message: SampMessage) {
        if !self.bus.is_connected() {
            self.notify(NoticeLevel::Warning, "No SAMP hub is connected.");
            return;
        }
        if !self.bus.send(message) {
            self.notify(NoticeLevel::Error, "Unable to send the SAMP message.");
        }
    }
}

#[cfg(test)]
mod tests;
