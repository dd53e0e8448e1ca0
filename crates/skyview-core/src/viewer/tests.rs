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

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::*;
use crate::catalog::CSC_COLUMNS;
use crate::render::{Color, Geometry, MemoryRenderer};
use crate::samp::NullBus;
use crate::storage::MemoryStore;
use crate::view::ZoomAction;

const STACK_ID: &str = "acisfJ0618409m705956_001";
const STACK_RA: f64 = 94.670_417;
const STACK_DEC: f64 = -70.998_889;

const STACKS: &str = r#"{"stacks": [
    {"stackid": "acisfJ0618409m705956_001",
     "polygons": [[[[94.6, -71.0], [94.8, -71.0], [94.8, -70.9]]]],
     "names": ["LMC X-4"], "description": "ACIS stack", "obis": ["09571_000"]},
    {"stackid": "acisfJ0618420m705000_001",
     "polygons": [[[[94.6, -70.9], [94.8, -70.9], [94.8, -70.8]]]],
     "names": [], "description": "", "obis": []}
]}"#;

#[derive(Debug, Clone, Default)]
struct RecordingBus {
    sent: Arc<Mutex<Vec<&'static str>>>,
}

impl MessageBus for RecordingBus {
    fn is_connected(&self) -> bool {
        true
    }

    fn send(&mut self, message: SampMessage) -> bool {
        self.sent.lock().unwrap().push(message.mtype());
        true
    }
}

fn settings() -> ViewerSettings {
    ViewerSettings {
        chunk_count: 2,
        ..ViewerSettings::default()
    }
}

fn ready_viewer_with<S, B>(store: S, bus: B) -> Viewer<MemoryRenderer>
where
    S: KeyValueStore + Send + 'static,
    B: MessageBus + Send + 'static,
{
    let renderer = MemoryRenderer::new(ViewState::default());
    let mut viewer = Viewer::new(renderer, store, bus, settings());
    viewer.load_stacks(STACKS).unwrap();
    assert_eq!(viewer.start(Instant::now()), InitAction::Restart(1));
    assert!(viewer.renderer_ready());
    viewer.take_notices();
    viewer
}

fn ready_viewer() -> Viewer<MemoryRenderer> {
    ready_viewer_with(MemoryStore::new(), NullBus)
}

fn row(name: &str, ra: f64, dec: f64) -> Value {
    let mut fields = vec![json!(name), json!(ra), json!(dec)];
    fields.resize(CSC_COLUMNS.len(), Value::Null);
    fields[schema::NH_GAL_COLUMN] = json!(0.07);
    Value::Array(fields)
}

fn chunk(start: usize, rows: Vec<Value>) -> Result<String, FetchFailure> {
    Ok(json!({
        "ntotal": 3,
        "start": start,
        "cols": CSC_COLUMNS,
        "rows": rows,
    })
    .to_string())
}

/// Request the primary catalog and deliver both chunks, last one first.
fn load_primary(viewer: &mut Viewer<MemoryRenderer>) {
    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    let requests = viewer.take_requests();
    let [Request::FetchChunks { generation, count }] = requests.as_slice() else {
        panic!("unexpected requests {requests:?}");
    };
    assert_eq!(*count, 2);
    assert!(viewer.is_busy());

    viewer.chunk_completed(*generation, 2, chunk(2, vec![row("2CXO J053842.4-690604", 84.6768, -69.1011)]));
    assert!(!viewer.catalog(CatalogKind::Csc20).is_loaded());
    viewer.chunk_completed(
        *generation,
        1,
        chunk(
            0,
            vec![
                row("2CXO J053840.0-690600", 84.6667, -69.1000),
                row("2CXO J132500.0+100000", 201.25, 10.0),
            ],
        ),
    );
}

fn notice_texts(viewer: &mut Viewer<MemoryRenderer>) -> Vec<String> {
    viewer.take_notices().into_iter().map(|n| n.text).collect()
}

#[test]
fn test_ready_builds_footprints_once() {
    let mut viewer = ready_viewer();
    assert!(viewer.stacks_shown());
    assert_eq!(viewer.renderer().shown_count(), 2);
    assert!(viewer.init_state() == InitState::Ready);
    assert!(!viewer.renderer_ready());
}

#[test]
fn test_ready_restores_foreground_and_location() {
    let mut store = MemoryStore::new();
    store.set(FOREGROUND_KEY, "halpha");
    store.set(LOCATION_KEY, r#"{"ra": 10.5, "dec": 41.2, "fov": 2.0}"#);
    let viewer = ready_viewer_with(store, NullBus);

    assert_eq!(
        viewer.renderer().foreground(),
        (Some("Hydrogen Alpha Full Sky Map"), 100.0)
    );
    let view = viewer.renderer().view();
    assert!((view.ra - 10.5).abs() < 1e-9);
    assert!((view.fov - 2.0).abs() < 1e-9);
}

#[test]
fn test_bookmark_overrides_stored_location_and_selects_stack() {
    let mut store = MemoryStore::new();
    store.set(LOCATION_KEY, r#"{"ra": 10.5, "dec": 41.2, "fov": 2.0}"#);
    let renderer = MemoryRenderer::new(ViewState::default());
    let mut viewer = Viewer::new(renderer, store, NullBus, settings());
    viewer.load_stacks(STACKS).unwrap();
    viewer.set_bookmark(Bookmark::parse(&format!(
        "ra={STACK_RA}&dec={STACK_DEC}&stackid={STACK_ID}"
    )));
    viewer.start(Instant::now());
    viewer.renderer_ready();

    let view = viewer.renderer().view();
    assert!((view.ra - STACK_RA).abs() < 1e-6);
    assert!((view.fov - 2.0).abs() < 1e-9);
    assert_eq!(viewer.selected_stack().unwrap().id, STACK_ID);
}

#[test]
fn test_tick_persists_moved_view() {
    let mut store = MemoryStore::new();
    store.set("marker", "1");
    let mut viewer = ready_viewer_with(store, NullBus);
    assert!(!viewer.persist_view());

    viewer.dispatch(Command::Zoom(ZoomAction::In));
    viewer.tick(Instant::now());
    assert!(!viewer.persist_view());
    let saved = viewer.store.get(LOCATION_KEY).unwrap();
    let view = ViewState::from_json(&saved).unwrap();
    assert!((view.fov - 4.0).abs() < 1e-9);
}

#[test]
fn test_init_gives_up_after_timeouts() {
    let renderer = MemoryRenderer::new(ViewState::default());
    let mut viewer = Viewer::new(
        renderer,
        MemoryStore::new(),
        NullBus,
        ViewerSettings {
            init_timeout: Duration::from_secs(1),
            init_attempts: 2,
            ..settings()
        },
    );
    let t0 = Instant::now();
    viewer.start(t0);
    assert_eq!(
        viewer.tick(t0 + Duration::from_secs(2)),
        InitAction::Restart(2)
    );
    assert_eq!(viewer.tick(t0 + Duration::from_secs(4)), InitAction::GiveUp);
    assert_eq!(viewer.init_state(), InitState::Failed);
    assert!(!viewer.renderer_ready());
    assert_eq!(
        viewer.take_notices()[0].level,
        NoticeLevel::Error
    );
}

#[test]
fn test_primary_catalog_loads_in_chunks_and_shows() {
    let mut viewer = ready_viewer();
    load_primary(&mut viewer);

    assert!(!viewer.is_busy());
    assert!(viewer.is_shown(CatalogKind::Csc20));
    assert_eq!(viewer.mode(), SelectionMode::Source);

    // the far source is outside the field of view
    let shown = viewer.shown_sources();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].0, 0);
    assert_eq!(shown[1].0, 2);
    assert!(viewer.plot_data().is_some());

    let texts = notice_texts(&mut viewer);
    assert!(texts.iter().any(|t| t == "CSC2.0 sources loaded."));
}

#[test]
fn test_show_while_loading_does_not_refetch() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    viewer.dispatch(Command::ToggleCatalog(CatalogKind::Csc20));
    assert_eq!(viewer.take_requests().len(), 1);
    assert_eq!(viewer.busy.count(), 1);
}

#[test]
fn test_failed_chunk_aborts_and_later_load_ignores_old_generation() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    let Request::FetchChunks { generation: old, .. } = viewer.take_requests()[0] else {
        panic!("expected a chunk request");
    };

    viewer.chunk_completed(old, 1, Err(FetchFailure::Status(404)));
    assert!(!viewer.is_busy());
    assert!(notice_texts(&mut viewer)
        .iter()
        .any(|t| t.contains("404")));

    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    let Request::FetchChunks { generation: new, .. } = viewer.take_requests()[0] else {
        panic!("expected a chunk request");
    };
    assert_ne!(old, new);

    viewer.chunk_completed(old, 2, chunk(2, vec![row("late", 84.6, -69.1)]));
    viewer.chunk_completed(new, 2, chunk(2, vec![row("b", 84.6768, -69.1011)]));
    viewer.chunk_completed(new, 1, chunk(0, vec![row("a", 84.6667, -69.1), row("c", 84.7, -69.1)]));

    let rows = viewer.catalog(CatalogKind::Csc20).rows().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2][0].as_str(), Some("b"));
}

#[test]
fn test_bad_chunk_schema_reports_error() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    let Request::FetchChunks { generation, .. } = viewer.take_requests()[0] else {
        panic!("expected a chunk request");
    };
    let body = json!({"ntotal": 1, "start": 0, "cols": ["name"], "rows": []}).to_string();
    viewer.chunk_completed(generation, 1, Ok(body));

    assert!(!viewer.is_busy());
    assert!(!viewer.loader.is_loading());
    assert_eq!(viewer.take_notices()[1].level, NoticeLevel::Error);
}

#[test]
fn test_click_selects_nearest_stack() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::Click {
        ra: STACK_RA - 360.0,
        dec: STACK_DEC,
    });

    let selected = viewer.selected_stack().unwrap();
    assert_eq!(selected.id, STACK_ID);
    assert!(selected.separation.abs() < 1e-6);
    assert!(selected.nearby.is_empty());

    let shape = viewer.stack_overlay.as_ref().unwrap().shapes(STACK_ID)[0];
    let style = viewer.renderer().shape_style(shape).unwrap();
    assert_eq!(style.line_color, Color::CYAN);
    assert!((style.line_width - 4.0).abs() < f64::EPSILON);

    viewer.dispatch(Command::ClearNearestStack);
    let style = viewer.renderer().shape_style(shape).unwrap();
    assert_eq!(style.line_color, Color::GREY);
    assert!(viewer.selected_stack().is_none());
}

#[test]
fn test_nearby_stacks_highlighted() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::SetNearbyStacks(true));
    viewer.dispatch(Command::Click {
        ra: STACK_RA,
        dec: STACK_DEC,
    });

    let selected = viewer.selected_stack().unwrap();
    assert_eq!(selected.nearby.len(), 1);
    let neighbor = &selected.nearby[0].item;
    let shape = viewer.stack_overlay.as_ref().unwrap().shapes(neighbor)[0];
    let style = viewer.renderer().shape_style(shape).unwrap();
    assert!((style.line_width - 2.0).abs() < f64::EPSILON);
}

#[test]
fn test_click_beyond_fov_selects_nothing() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::Click {
        ra: 200.0,
        dec: 30.0,
    });
    assert!(viewer.selected_stack().is_none());
}

#[test]
fn test_status_restyles_and_sets_chunk_count() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::Click {
        ra: STACK_RA,
        dec: STACK_DEC,
    });
    let summary = viewer
        .apply_status(&format!(r#"{{"stacks": {{"{STACK_ID}": 1}}, "nchunks": 5}}"#))
        .unwrap();
    assert_eq!(summary.finished, 1);
    assert_eq!(viewer.settings().chunk_count, 5);

    // the selection survives the restyle
    assert_eq!(viewer.selected_stack().unwrap().id, STACK_ID);
    viewer.dispatch(Command::ClearNearestStack);

    let shape = viewer.stack_overlay.as_ref().unwrap().shapes(STACK_ID)[0];
    let style = viewer.renderer().shape_style(shape).unwrap();
    assert_eq!(style.line_color, Color::GOLD);
    assert!((style.line_width - 2.0).abs() < f64::EPSILON);
}

#[test]
fn test_status_with_zero_chunks_keeps_chunk_count() {
    let mut viewer = ready_viewer();
    let before = viewer.settings().chunk_count;
    viewer
        .apply_status(r#"{"stacks": {}, "nchunks": 0}"#)
        .unwrap();
    assert_eq!(viewer.settings().chunk_count, before);

    viewer.take_requests();
    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    let requests = viewer.take_requests();
    assert!(matches!(
        requests.as_slice(),
        [Request::FetchChunks { count, .. }] if *count == before
    ));
}

#[test]
fn test_source_selection_and_hide_reverts_mode() {
    let mut viewer = ready_viewer();
    load_primary(&mut viewer);
    viewer.dispatch(Command::SetNearbySources(true));

    viewer.dispatch(Command::Click {
        ra: 84.6767,
        dec: -69.1011,
    });
    let selected = viewer.selected_source().unwrap();
    assert_eq!(selected.row, 2);
    assert_eq!(
        selected.properties.name.as_deref(),
        Some("2CXO J053842.4-690604")
    );
    assert_eq!(selected.nearby.len(), 1);
    assert_eq!(selected.nearby[0].item, 0);

    let shape = viewer
        .overlay(CatalogKind::Csc20)
        .unwrap()
        .annotation(2)
        .unwrap()
        .shape;
    assert!((viewer.renderer().shape_style(shape).unwrap().opacity - 1.0).abs() < f64::EPSILON);

    viewer.dispatch(Command::HideCatalog(CatalogKind::Csc20));
    assert!(!viewer.is_shown(CatalogKind::Csc20));
    assert_eq!(viewer.mode(), SelectionMode::Stack);
    assert!(viewer.selected_source().is_none());
    assert!(viewer.plot_data().is_none());
    assert!((viewer.renderer().shape_style(shape).unwrap().opacity - 0.1).abs() < 1e-9);
}

#[test]
fn test_source_mode_needs_shown_sources() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::SetMode(SelectionMode::Source));
    assert_eq!(viewer.mode(), SelectionMode::Stack);
    assert_eq!(viewer.take_notices()[0].level, NoticeLevel::Warning);

    viewer.dispatch(Command::SetMode(SelectionMode::Point));
    viewer.dispatch(Command::Click { ra: 12.0, dec: 3.0 });
    let view = viewer.renderer().view();
    assert!((view.ra - 12.0).abs() < 1e-9);
    assert!((view.fov - 5.0).abs() < 1e-9);
}

#[test]
fn test_empty_view_notice() {
    let mut viewer = ready_viewer();
    load_primary(&mut viewer);
    viewer.dispatch(Command::HideCatalog(CatalogKind::Csc20));
    viewer.dispatch(Command::Goto {
        ra: 300.0,
        dec: -10.0,
        fov: 1.0,
    });
    viewer.take_notices();
    viewer.dispatch(Command::ShowCatalog(CatalogKind::Csc20));
    assert_eq!(
        notice_texts(&mut viewer),
        vec!["No CSC2.0 sources found in this area of the sky.".to_owned()]
    );
    assert!(!viewer.is_shown(CatalogKind::Csc20));
}

#[test]
fn test_polygon_selection() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::SetMode(SelectionMode::Polygon));
    viewer.dispatch(Command::Click { ra: 84.0, dec: -69.0 });
    viewer.dispatch(Command::Click { ra: 85.0, dec: -69.0 });
    viewer.dispatch(Command::FinishPolygon);
    assert!(viewer.finished_polygon().is_none());

    viewer.dispatch(Command::Click { ra: 85.0, dec: -70.0 });
    viewer.dispatch(Command::FinishPolygon);
    assert_eq!(viewer.finished_polygon().unwrap().len(), 3);

    viewer.dispatch(Command::ClearPolygon);
    assert_eq!(viewer.polygon_vertices(), 0);
    assert!(viewer.finished_polygon().is_none());
    assert_eq!(viewer.mode(), SelectionMode::Stack);
}

#[test]
fn test_position_target_moves_and_points_samp() {
    let bus = RecordingBus::default();
    let sent = Arc::clone(&bus.sent);
    let mut viewer = ready_viewer_with(MemoryStore::new(), bus);

    viewer.dispatch(Command::FindTarget("10.68, 41.27".to_owned()));
    let view = viewer.renderer().view();
    assert!((view.ra - 10.68).abs() < 1e-9);
    assert!((view.fov - TARGET_FOV).abs() < 1e-9);
    assert_eq!(*sent.lock().unwrap(), vec!["coord.pointAt.sky"]);
    assert!(viewer.target_label().is_some());
}

#[test]
fn test_source_name_target_needs_catalog() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::FindTarget("2CXO J053842.4-690604".to_owned()));
    assert_eq!(
        notice_texts(&mut viewer),
        vec!["The CSC 2.0 sources must be loaded before they can be used in a search.".to_owned()]
    );
    assert!(viewer.take_requests().is_empty());

    load_primary(&mut viewer);
    viewer.dispatch(Command::FindTarget("2CXO J053842.4-690604".to_owned()));
    assert!(!viewer.is_shown(CatalogKind::Csc20));
    let view = viewer.renderer().view();
    assert!((view.ra - 84.6768).abs() < 1e-9);
}

#[test]
fn test_stack_id_target() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::FindTarget(STACK_ID.to_owned()));
    let view = viewer.renderer().view();
    assert!((view.ra - STACK_RA).abs() < 1e-5);
    assert!(viewer.take_requests().is_empty());
}

#[test]
fn test_name_lookup_round_trip() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::FindTarget("M31".to_owned()));
    assert_eq!(
        viewer.take_requests(),
        vec![Request::Lookup("M31".to_owned())]
    );
    assert!(viewer.is_busy());
    viewer.take_notices();

    let body = r#"{"ra": {"decimal": 10.68}, "dec": {"decimal": 41.27},
                   "service": {"name": "SIMBAD"},
                   "category": {"avmcode": "5.1.1", "avmdesc": "Galaxy"}}"#;
    viewer.lookup_completed("M31", Ok(body.to_owned()));

    assert!(!viewer.is_busy());
    assert_eq!(viewer.target_label(), Some("M31"));
    assert_eq!(
        notice_texts(&mut viewer),
        vec!["Location provided for M31 by SIMBAD. Source category: Galaxy".to_owned()]
    );
}

#[test]
fn test_lookup_failures_keep_busy_balanced() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::FindTarget("M31".to_owned()));
    viewer.lookup_completed("M31", Err(FetchFailure::Network("timeout".to_owned())));
    assert!(!viewer.is_busy());

    viewer.dispatch(Command::FindTarget("M3l".to_owned()));
    viewer.take_notices();
    viewer.lookup_completed("M3l", Ok(r#"{"target": {"suggestion": "M31"}}"#.to_owned()));
    assert!(!viewer.is_busy());
    assert_eq!(
        notice_texts(&mut viewer),
        vec!["Target \"M3l\" not found. Did you mean \"M31\"?".to_owned()]
    );

    viewer.dispatch(Command::FindTarget("x".to_owned()));
    viewer.take_notices();
    viewer.lookup_completed("x", Ok(r#"{"type": "error"}"#.to_owned()));
    assert_eq!(
        notice_texts(&mut viewer),
        vec!["There was a problem querying the lookUP service.".to_owned()]
    );
}

#[test]
fn test_style_changes() {
    let mut viewer = ready_viewer();
    load_primary(&mut viewer);

    viewer.dispatch(Command::SetStyle {
        kind: CatalogKind::Csc20,
        change: StyleChange::Size(-1.0),
    });
    assert!((viewer.catalog(CatalogKind::Csc20).style().size_arcsec() - 5.0).abs() < 1e-9);

    viewer.dispatch(Command::SetStyle {
        kind: CatalogKind::Csc20,
        change: StyleChange::Size(10.0),
    });
    let shape = viewer
        .overlay(CatalogKind::Csc20)
        .unwrap()
        .annotation(0)
        .unwrap()
        .shape;
    let spec = viewer.renderer().shape(shape).unwrap();
    assert!(matches!(
        spec.geometry,
        Geometry::Circle { radius, .. } if (radius - 10.0 / 3600.0).abs() < 1e-12
    ));

    viewer.dispatch(Command::SetStyle {
        kind: CatalogKind::Csc20,
        change: StyleChange::Color(Color::PINK),
    });
    assert_eq!(viewer.renderer().shape_style(shape).unwrap().line_color, Color::PINK);

    viewer.take_notices();
    viewer.dispatch(Command::SetStyle {
        kind: CatalogKind::Chs,
        change: StyleChange::Color(Color::PINK),
    });
    assert_eq!(viewer.take_notices()[0].level, NoticeLevel::Warning);
}

#[test]
fn test_comparison_catalog_takes_payload_label() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::ToggleCatalog(CatalogKind::Xmm));
    assert_eq!(
        viewer.take_requests(),
        vec![Request::FetchCatalog(CatalogKind::Xmm)]
    );
    viewer.catalog_completed(
        CatalogKind::Xmm,
        Ok(r#"{"catalog": "3XMM-DR8", "sources": [[84.7, -69.1], [84.8, -69.2]]}"#.to_owned()),
    );
    assert!(!viewer.is_busy());
    assert_eq!(viewer.catalog(CatalogKind::Xmm).label(), "3XMM-DR8");
    assert!(viewer.is_shown(CatalogKind::Xmm));

    viewer.dispatch(Command::ToggleCatalog(CatalogKind::Xmm));
    assert!(!viewer.is_shown(CatalogKind::Xmm));
    assert_eq!(viewer.mode(), SelectionMode::Stack);
}

#[test]
fn test_unrequested_catalog_ignored() {
    let mut viewer = ready_viewer();
    viewer.catalog_completed(CatalogKind::Csc11, Ok("[]".to_owned()));
    assert!(!viewer.catalog(CatalogKind::Csc11).is_loaded());
    assert!(!viewer.is_busy());
}

#[test]
fn test_image_choice_is_stored() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::SetImage("rass".to_owned()));
    assert_eq!(
        viewer.renderer().foreground(),
        (Some("RASS: ROSAT All Sky Survey (X-ray)"), 100.0)
    );
    assert_eq!(viewer.bookmark().display.as_deref(), Some("rass"));

    viewer.dispatch(Command::SetImage("dss".to_owned()));
    assert!((viewer.renderer().foreground().1).abs() < f64::EPSILON);

    viewer.dispatch(Command::SetImage("nonsense".to_owned()));
    assert_eq!(viewer.bookmark().display.as_deref(), Some("dss"));
}

#[test]
fn test_zoom_out_of_range_ignored() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::Zoom(ZoomAction::To(120.0)));
    assert!((viewer.renderer().view().fov - 5.0).abs() < 1e-9);
    viewer.dispatch(Command::Zoom(ZoomAction::Out));
    assert!((viewer.renderer().view().fov - 6.25).abs() < 1e-9);
}

#[test]
fn test_samp_commands_need_hub() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::SendSourceProperties("2CXO J053842.4-690604".to_owned()));
    assert_eq!(
        notice_texts(&mut viewer),
        vec!["No SAMP hub is connected.".to_owned()]
    );

    let bus = RecordingBus::default();
    let sent = Arc::clone(&bus.sent);
    let mut viewer = ready_viewer_with(MemoryStore::new(), bus);
    viewer.load_versions(&format!(r#"{{"{STACK_ID}": 3}}"#)).unwrap();
    viewer.dispatch(Command::SendStackEvents(STACK_ID.to_owned()));
    viewer.dispatch(Command::SendStackEvents("unknown_001".to_owned()));
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[test]
fn test_milky_way_fetched_once_then_toggled() {
    let mut viewer = ready_viewer();
    viewer.dispatch(Command::ToggleMilkyWay);
    viewer.dispatch(Command::ToggleMilkyWay);
    assert_eq!(viewer.take_requests(), vec![Request::FetchMilkyWay]);

    let geojson = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "geometry": {"type": "MultiPolygon",
         "coordinates": [[[[-10.0, 5.0], [10.0, 5.0], [10.0, -5.0]]]]}}]}"#;
    viewer.milky_way_completed(Ok(geojson.to_owned()));
    assert!(viewer.milky_way_shown());
    assert!(!viewer.is_busy());

    viewer.dispatch(Command::ToggleMilkyWay);
    assert!(!viewer.milky_way_shown());
    assert!(viewer.take_requests().is_empty());
}
