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

//! Annotation lifecycle.
//!
//! Shapes for every catalog row are created once, when the catalog data
//! arrives, and then registered with or removed from the renderer as the
//! catalog is shown and hidden. A catalog has at most one shown set at a
//! time: showing while shown and hiding while hidden are logged no-ops.
//!
//! Stack footprints and the Milky Way outline are simpler: all shapes are
//! created up front and toggled as a unit.

mod milkyway;

pub use milkyway::{MilkyWayOverlay, OutlineError};

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::catalog::{schema, CatalogData, CatalogError, CatalogKind, CatalogState, CatalogStyle};
use crate::nearest::find_nearest;
use crate::render::{Color, Geometry, Renderer, ShapeId, ShapeSpec, ShapeStyle};
use crate::stacks::{StackStatus, StackTable};
use crate::view::ViewState;

/// Label given to primary rows that have not been processed yet. Their
/// color is fixed.
pub const UNPROCESSED_LABEL: &str = "unprocessed";

/// A shape paired with the position it marks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub shape: ShapeId,
    pub ra: f64,
    pub dec: f64,
}

impl Annotation {
    /// Register the shape for display. Adding a shape that is already
    /// shown is reported and otherwise ignored.
    pub fn add<R: Renderer>(&self, renderer: &mut R) {
        if !renderer.add_annotation(self.shape) {
            warn!("Annotation {} is already shown", self.shape);
        }
    }

    /// Remove the shape from display. Removing a shape that is not shown
    /// is reported and otherwise ignored.
    pub fn remove<R: Renderer>(&self, renderer: &mut R) {
        if !renderer.remove_annotation(self.shape) {
            warn!("Annotation {} is not shown", self.shape);
        }
    }
}

/// The rows a catalog is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownSet {
    /// Row indices, ascending.
    pub rows: Vec<usize>,
    /// The view the set was computed for.
    pub view: ViewState,
    outline: Option<ShapeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    Hidden,
    Shown(ShownSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    /// This many rows are now shown.
    Shown(usize),
    /// Nothing lies in the current field of view; the catalog stays hidden.
    Empty,
    AlreadyShown,
}

fn marker_style(kind: CatalogKind, style: &CatalogStyle, unprocessed: bool) -> ShapeStyle {
    let mut shape = ShapeStyle {
        line_color: style.color.clone(),
        line_width: 1.0,
        fill_color: style.color.clone(),
        fill: true,
        opacity: style.opacity,
        label: None,
    };
    if kind == CatalogKind::Csc20 {
        shape.fill_color = Color::WHITE;
        if unprocessed {
            shape.line_color = Color::GREY;
            shape.fill_color = Color::GREY;
            shape.label = Some(UNPROCESSED_LABEL.to_owned());
        }
    }
    shape
}

fn hull_style(changed: bool, opacity: f64) -> ShapeStyle {
    let color = if changed { Color::CYAN } else { Color::PINK };
    ShapeStyle {
        line_color: color.clone(),
        line_width: 2.0,
        fill_color: color,
        fill: false,
        opacity,
        label: None,
    }
}

/// Shapes and visibility of one catalog.
#[derive(Debug, Clone)]
pub struct CatalogOverlay {
    kind: CatalogKind,
    label: String,
    /// One entry per row; rows without a position have no shape.
    annotations: Vec<Option<Annotation>>,
    visibility: Visibility,
}

impl CatalogOverlay {
    /// Create a shape for every row of a loaded catalog. Nothing is shown
    /// yet.
    pub fn build<R: Renderer>(
        state: &CatalogState,
        renderer: &mut R,
    ) -> Result<Self, CatalogError> {
        let kind = state.kind();
        let data = state
            .data()
            .ok_or_else(|| CatalogError::NotLoaded(state.label().to_owned()))?;
        let style = state.style();

        let circle = |renderer: &mut R, ra: f64, dec: f64, shape: ShapeStyle| Annotation {
            shape: renderer.create_shape(ShapeSpec {
                geometry: Geometry::Circle {
                    ra,
                    dec,
                    radius: style.size_deg,
                },
                style: shape,
            }),
            ra,
            dec,
        };

        let annotations: Vec<Option<Annotation>> = match data {
            CatalogData::Sources(rows) => rows
                .iter()
                .map(|row| {
                    let Some((ra, dec)) = schema::row_position(row) else {
                        warn!(
                            "No location for source {}",
                            row.first().map(ToString::to_string).unwrap_or_default()
                        );
                        return None;
                    };
                    let shape = marker_style(kind, style, schema::is_unprocessed(row));
                    Some(circle(renderer, ra, dec, shape))
                })
                .collect(),
            CatalogData::Comparison(rows) => rows
                .iter()
                .map(|src| {
                    let Some((ra, dec)) = src.position() else {
                        warn!("No location for {} source", state.label());
                        return None;
                    };
                    Some(circle(renderer, ra, dec, marker_style(kind, style, false)))
                })
                .collect(),
            CatalogData::Hulls(hulls) => hulls
                .iter()
                .map(|hull| {
                    let &(ra, dec) = hull.points.first()?;
                    let shape = renderer.create_shape(ShapeSpec {
                        geometry: Geometry::Polygon {
                            points: hull.points.clone(),
                        },
                        style: hull_style(hull.changed, style.opacity),
                    });
                    Some(Annotation { shape, ra, dec })
                })
                .collect(),
        };

        info!(
            "Created {} annotations for {}",
            annotations.iter().flatten().count(),
            state.label()
        );

        Ok(Self {
            kind,
            label: state.label().to_owned(),
            annotations,
            visibility: Visibility::Hidden,
        })
    }

    #[must_use]
    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    #[must_use]
    pub fn is_shown(&self) -> bool {
        matches!(self.visibility, Visibility::Shown(_))
    }

    #[must_use]
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Row indices currently shown; empty while hidden.
    #[must_use]
    pub fn shown_rows(&self) -> &[usize] {
        match &self.visibility {
            Visibility::Shown(set) => &set.rows,
            Visibility::Hidden => &[],
        }
    }

    #[must_use]
    pub fn shown_view(&self) -> Option<ViewState> {
        match &self.visibility {
            Visibility::Shown(set) => Some(set.view),
            Visibility::Hidden => None,
        }
    }

    #[must_use]
    pub fn annotation(&self, row: usize) -> Option<&Annotation> {
        self.annotations.get(row)?.as_ref()
    }

    /// Number of rows with a shape.
    #[must_use]
    pub fn annotation_count(&self) -> usize {
        self.annotations.iter().flatten().count()
    }

    /// Show the rows within the current field of view (every row for
    /// catalogs that are not filtered by view).
    pub fn show<R: Renderer>(&mut self, renderer: &mut R) -> ShowOutcome {
        if self.is_shown() {
            warn!("show {} called while already shown", self.label);
            return ShowOutcome::AlreadyShown;
        }

        let view = renderer.view();
        let mut rows: Vec<usize> = if self.kind.fov_filtered() {
            find_nearest(
                view.ra,
                view.dec,
                view.fov,
                self.annotations.iter().enumerate(),
                |(_, ann)| ann.map(|a| (a.ra, a.dec)),
                |(row, _)| row,
            )
            .into_iter()
            .map(|n| n.item)
            .collect()
        } else {
            self.annotations
                .iter()
                .enumerate()
                .filter_map(|(row, ann)| ann.map(|_| row))
                .collect()
        };

        if rows.is_empty() {
            debug!("No {} sources in view {view:?}", self.label);
            return ShowOutcome::Empty;
        }
        rows.sort_unstable();

        for row in &rows {
            if let Some(ann) = self.annotation(*row) {
                ann.add(renderer);
            }
        }

        let outline = (self.kind == CatalogKind::Csc20).then(|| {
            let shape = renderer.create_shape(ShapeSpec {
                geometry: Geometry::Circle {
                    ra: view.ra,
                    dec: view.dec,
                    radius: view.fov,
                },
                style: ShapeStyle {
                    line_color: Color::ORANGE,
                    ..ShapeStyle::default()
                },
            });
            renderer.add_annotation(shape);
            shape
        });

        let count = rows.len();
        info!("Showing {count} {} sources", self.label);
        self.visibility = Visibility::Shown(ShownSet {
            rows,
            view,
            outline,
        });
        ShowOutcome::Shown(count)
    }

    /// Remove every shown shape. Returns `false` if nothing was shown.
    pub fn hide<R: Renderer>(&mut self, renderer: &mut R) -> bool {
        let Visibility::Shown(set) = std::mem::replace(&mut self.visibility, Visibility::Hidden)
        else {
            warn!("hide {} called when nothing is shown", self.label);
            return false;
        };

        for row in &set.rows {
            if let Some(ann) = self.annotation(*row) {
                ann.remove(renderer);
            }
        }
        if let Some(outline) = set.outline {
            renderer.remove_annotation(outline);
            renderer.release_shape(outline);
        }
        debug!("Hid {} {} sources", set.rows.len(), self.label);
        true
    }

    /// Recompute the shown set for the current view.
    pub fn refresh<R: Renderer>(&mut self, renderer: &mut R) -> ShowOutcome {
        if self.is_shown() {
            self.hide(renderer);
        }
        self.show(renderer)
    }

    /// Change the marker color. The primary catalog only changes the
    /// outline, and leaves unprocessed rows alone; the comparison
    /// catalogs change both outline and fill.
    pub fn set_color<R: Renderer>(&self, renderer: &mut R, color: &Color) {
        for ann in self.annotations.iter().flatten() {
            let Some(mut style) = renderer.shape_style(ann.shape) else {
                continue;
            };
            if style.label.as_deref() == Some(UNPROCESSED_LABEL) {
                continue;
            }
            style.line_color = color.clone();
            if self.kind != CatalogKind::Csc20 {
                style.fill_color = color.clone();
            }
            renderer.set_style(ann.shape, style);
        }
    }

    /// Change the marker radius, in degrees.
    pub fn set_radius<R: Renderer>(&self, renderer: &mut R, radius: f64) {
        for ann in self.annotations.iter().flatten() {
            renderer.set_radius(ann.shape, radius);
        }
    }
}

/// Footprint style for a stack.
#[must_use]
pub fn footprint_style(status: StackStatus) -> ShapeStyle {
    let (line_color, line_width) = if status.is_finished() {
        (Color::GOLD, 2.0)
    } else {
        (Color::GREY, 1.0)
    };
    ShapeStyle {
        line_color,
        line_width,
        fill_color: Color::WHITE,
        fill: false,
        opacity: 0.1,
        label: None,
    }
}

/// Footprint outlines of every stack.
#[derive(Debug, Clone, Default)]
pub struct StackOverlay {
    footprints: HashMap<String, Vec<ShapeId>>,
    shown: bool,
}

impl StackOverlay {
    /// Create and show the footprints of every stack.
    pub fn build<R: Renderer>(table: &StackTable, renderer: &mut R) -> Self {
        let mut footprints = HashMap::with_capacity(table.len());
        for stack in table.iter() {
            let style = footprint_style(stack.status);
            let shapes: Vec<ShapeId> = stack
                .outlines()
                .map(|outline| {
                    let shape = renderer.create_shape(ShapeSpec {
                        geometry: Geometry::Polygon {
                            points: outline.clone(),
                        },
                        style: style.clone(),
                    });
                    renderer.add_annotation(shape);
                    shape
                })
                .collect();
            footprints.insert(stack.id.clone(), shapes);
        }
        info!("Added footprints for {} stacks", footprints.len());

        Self {
            footprints,
            shown: true,
        }
    }

    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// Footprint shapes of one stack.
    #[must_use]
    pub fn shapes(&self, id: &str) -> &[ShapeId] {
        self.footprints
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Flip between all shown and all hidden. Returns the new state.
    pub fn toggle<R: Renderer>(&mut self, renderer: &mut R) -> bool {
        for shape in self.footprints.values().flatten() {
            if self.shown {
                renderer.remove_annotation(*shape);
            } else {
                renderer.add_annotation(*shape);
            }
        }
        self.shown = !self.shown;
        self.shown
    }

    /// Re-apply the status styling, after a status update.
    pub fn restyle<R: Renderer>(&self, table: &StackTable, renderer: &mut R) {
        for stack in table.iter() {
            let style = footprint_style(stack.status);
            for shape in self.shapes(&stack.id) {
                renderer.set_style(*shape, style.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRow, ComparisonSource, Field, Hull, CSC_COLUMNS};
    use crate::render::MemoryRenderer;

    fn source_row(ra: f64, dec: f64, processed: bool) -> CatalogRow {
        let mut row = vec![Field::Null; CSC_COLUMNS.len()];
        row[0] = Field::Text(format!("src {ra} {dec}"));
        row[1] = Field::Number(ra);
        row[2] = Field::Number(dec);
        if processed {
            row[schema::NH_GAL_COLUMN] = Field::Number(0.05);
        }
        row
    }

    fn primary() -> CatalogState {
        let mut state = CatalogState::new(CatalogKind::Csc20);
        let rows = vec![
            source_row(84.7, -69.1, true),
            source_row(84.8, -69.2, false),
            source_row(150.0, 2.0, true),
        ];
        state.set_data(CatalogData::Sources(rows), None).unwrap();
        state
    }

    #[test]
    fn test_show_filters_by_fov_and_draws_outline() {
        let mut renderer = MemoryRenderer::default();
        let mut overlay = CatalogOverlay::build(&primary(), &mut renderer).unwrap();
        assert_eq!(overlay.annotation_count(), 3);
        assert_eq!(renderer.shown_count(), 0);

        assert_eq!(overlay.show(&mut renderer), ShowOutcome::Shown(2));
        assert_eq!(overlay.shown_rows(), &[0, 1]);
        // two sources plus the field-of-view circle
        assert_eq!(renderer.shown_count(), 3);

        let outline = renderer
            .shown_shapes()
            .into_iter()
            .find(|(_, s)| s.style.line_color == Color::ORANGE)
            .map(|(_, s)| s.geometry.clone());
        assert!(matches!(outline, Some(Geometry::Circle { radius, .. }) if (radius - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_show_twice_keeps_one_set() {
        let mut renderer = MemoryRenderer::default();
        let mut overlay = CatalogOverlay::build(&primary(), &mut renderer).unwrap();
        overlay.show(&mut renderer);
        assert_eq!(overlay.show(&mut renderer), ShowOutcome::AlreadyShown);
        assert_eq!(renderer.shown_count(), 3);

        assert!(overlay.hide(&mut renderer));
        assert_eq!(renderer.shown_count(), 0);
        assert!(!overlay.hide(&mut renderer));
        assert!(!overlay.is_shown());
    }

    #[test]
    fn test_show_empty_stays_hidden() {
        let mut renderer = MemoryRenderer::new(ViewState {
            ra: 300.0,
            dec: 45.0,
            fov: 1.0,
        });
        let mut overlay = CatalogOverlay::build(&primary(), &mut renderer).unwrap();
        assert_eq!(overlay.show(&mut renderer), ShowOutcome::Empty);
        assert!(!overlay.is_shown());
        assert_eq!(renderer.shown_count(), 0);
    }

    #[test]
    fn test_build_requires_data() {
        let mut renderer = MemoryRenderer::default();
        let state = CatalogState::new(CatalogKind::Xmm);
        assert!(matches!(
            CatalogOverlay::build(&state, &mut renderer),
            Err(CatalogError::NotLoaded(_))
        ));
    }

    #[test]
    fn test_missing_positions_skipped() {
        let mut state = CatalogState::new(CatalogKind::Csc11);
        let rows = vec![
            ComparisonSource {
                ra: Some(84.7),
                dec: Some(-69.1),
                name: None,
            },
            ComparisonSource {
                ra: None,
                dec: Some(-69.1),
                name: None,
            },
        ];
        state.set_data(CatalogData::Comparison(rows), None).unwrap();

        let mut renderer = MemoryRenderer::default();
        let mut overlay = CatalogOverlay::build(&state, &mut renderer).unwrap();
        assert_eq!(overlay.annotation_count(), 1);
        assert!(overlay.annotation(1).is_none());
        assert_eq!(overlay.show(&mut renderer), ShowOutcome::Shown(1));
        // comparison catalogs have no field-of-view circle
        assert_eq!(renderer.shown_count(), 1);
    }

    #[test]
    fn test_set_color_skips_unprocessed() {
        let mut renderer = MemoryRenderer::default();
        let overlay = CatalogOverlay::build(&primary(), &mut renderer).unwrap();
        overlay.set_color(&mut renderer, &Color::PINK);

        let processed = renderer.shape(overlay.annotation(0).unwrap().shape).unwrap();
        assert_eq!(processed.style.line_color, Color::PINK);
        assert_eq!(processed.style.fill_color, Color::WHITE);

        let unprocessed = renderer.shape(overlay.annotation(1).unwrap().shape).unwrap();
        assert_eq!(unprocessed.style.line_color, Color::GREY);
        assert_eq!(unprocessed.style.label.as_deref(), Some(UNPROCESSED_LABEL));
    }

    #[test]
    fn test_set_radius() {
        let mut renderer = MemoryRenderer::default();
        let overlay = CatalogOverlay::build(&primary(), &mut renderer).unwrap();
        overlay.set_radius(&mut renderer, 0.01);
        let shape = renderer.shape(overlay.annotation(2).unwrap().shape).unwrap();
        assert!(matches!(shape.geometry, Geometry::Circle { radius, .. } if (radius - 0.01).abs() < 1e-12));
    }

    #[test]
    fn test_static_catalog_shows_everything() {
        let mut state = CatalogState::new(CatalogKind::Chs);
        let hulls = vec![
            Hull {
                changed: true,
                points: vec![(10.0, 10.0), (10.1, 10.0), (10.1, 10.1)],
            },
            Hull {
                changed: false,
                points: vec![(200.0, -40.0), (200.1, -40.0), (200.1, -40.1)],
            },
        ];
        state.set_data(CatalogData::Hulls(hulls), None).unwrap();

        let mut renderer = MemoryRenderer::default();
        let mut overlay = CatalogOverlay::build(&state, &mut renderer).unwrap();
        assert_eq!(overlay.show(&mut renderer), ShowOutcome::Shown(2));

        let first = renderer.shape(overlay.annotation(0).unwrap().shape).unwrap();
        assert_eq!(first.style.line_color, Color::CYAN);
        let second = renderer.shape(overlay.annotation(1).unwrap().shape).unwrap();
        assert_eq!(second.style.line_color, Color::PINK);
        assert!((second.style.opacity - 0.6).abs() < 1e-12);
    }

    const STACKS: &str = r#"{"stacks": [
        {"stackid": "acisfJ0618409m705956_001", "status": true,
         "polygons": [[[[94.6, -71.0], [94.8, -71.0], [94.8, -70.9]]]]},
        {"stackid": "hrcfJ0539327m694405_001", "status": false,
         "polygons": [[[[84.8, -69.8], [84.9, -69.8], [84.9, -69.7]],
                       [[84.85, -69.75], [84.86, -69.75], [84.86, -69.74]]]]}
    ]}"#;

    #[test]
    fn test_stack_overlay_build_and_toggle() {
        let table = StackTable::from_json(STACKS).unwrap();
        let mut renderer = MemoryRenderer::default();
        let mut overlay = StackOverlay::build(&table, &mut renderer);

        assert!(overlay.is_shown());
        assert_eq!(renderer.shown_count(), 3);
        assert_eq!(overlay.shapes("hrcfJ0539327m694405_001").len(), 2);
        assert!(overlay.shapes("unknown").is_empty());

        let gold = renderer
            .shape(overlay.shapes("acisfJ0618409m705956_001")[0])
            .unwrap();
        assert_eq!(gold.style.line_color, Color::GOLD);
        assert!((gold.style.line_width - 2.0).abs() < 1e-12);

        assert!(!overlay.toggle(&mut renderer));
        assert_eq!(renderer.shown_count(), 0);
        assert!(overlay.toggle(&mut renderer));
        assert_eq!(renderer.shown_count(), 3);
    }
}
