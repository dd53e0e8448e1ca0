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

//! What a click on the sky means.
//!
//! Exactly one [`SelectionMode`] is bound at a time. The highlight types in
//! this module remember the style a shape had before it was highlighted so
//! it can be put back.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};

use crate::catalog::{schema, CatalogRow};
use crate::nearest::{find_closest, find_nearest, Neighbor};
use crate::render::{Color, Geometry, Renderer, ShapeId, ShapeSpec, ShapeStyle};
use crate::stacks::StackTable;

/// Default radius used to find stacks near the selected one, in
/// arc-minutes.
pub const DEFAULT_NEARBY_STACK_ARCMIN: f64 = 12.0;

/// Default number of extra sources listed around the selected one.
pub const DEFAULT_NEARBY_SOURCE_COUNT: usize = 10;

const STACK_HIGHLIGHT_WIDTH: f64 = 4.0;
const NEARBY_STACK_WIDTH: f64 = 2.0;
const SOURCE_HIGHLIGHT_OPACITY: f64 = 1.0;

/// Radius of the marker placed at the first polygon vertex, in degrees.
const POLYGON_MARKER_RADIUS: f64 = 2.0 / 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Select the nearest stack.
    #[default]
    Stack,
    /// Select the nearest shown source.
    Source,
    /// Add a vertex to the region polygon.
    Polygon,
    /// Recenter on the click.
    Point,
    /// Ignore clicks.
    None,
}

impl SelectionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Source => "source",
            Self::Polygon => "polygon",
            Self::Point => "point",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stack" => Ok(Self::Stack),
            "source" => Ok(Self::Source),
            "polygon" | "region" => Ok(Self::Polygon),
            "point" => Ok(Self::Point),
            "none" => Ok(Self::None),
            other => Err(format!("unknown selection mode: {other}")),
        }
    }
}

/// Holds the single bound click handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickDispatcher {
    mode: SelectionMode,
}

impl ClickDispatcher {
    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Replace the bound mode, returning the previous one.
    pub fn bind(&mut self, mode: SelectionMode) -> SelectionMode {
        debug!("Selection mode {} -> {mode}", self.mode);
        std::mem::replace(&mut self.mode, mode)
    }
}

/// Line style of a shape before it was highlighted.
#[derive(Debug, Clone, PartialEq)]
struct LineReset {
    shape: ShapeId,
    line_color: Color,
    line_width: f64,
}

/// Highlight of the nearest stack and, optionally, its neighbors.
#[derive(Debug, Clone, Default)]
pub struct StackHighlight {
    resets: Vec<LineReset>,
}

impl StackHighlight {
    fn highlight<R: Renderer>(&mut self, renderer: &mut R, shapes: &[ShapeId], width: f64) {
        for shape in shapes {
            let Some(mut style) = renderer.shape_style(*shape) else {
                warn!("Cannot highlight unknown {shape}");
                continue;
            };
            self.resets.push(LineReset {
                shape: *shape,
                line_color: style.line_color.clone(),
                line_width: style.line_width,
            });
            style.line_color = Color::CYAN;
            style.line_width = width;
            renderer.set_style(*shape, style);
        }
    }

    /// Highlight the footprint of the selected stack.
    pub fn select<R: Renderer>(&mut self, renderer: &mut R, shapes: &[ShapeId]) {
        self.highlight(renderer, shapes, STACK_HIGHLIGHT_WIDTH);
    }

    /// Highlight the footprint of a neighboring stack.
    pub fn add_nearby<R: Renderer>(&mut self, renderer: &mut R, shapes: &[ShapeId]) {
        self.highlight(renderer, shapes, NEARBY_STACK_WIDTH);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.resets.is_empty()
    }

    /// Restore every highlighted shape, most recent first.
    pub fn clear<R: Renderer>(&mut self, renderer: &mut R) {
        for reset in self.resets.drain(..).rev() {
            if let Some(mut style) = renderer.shape_style(reset.shape) {
                style.line_color = reset.line_color;
                style.line_width = reset.line_width;
                renderer.set_style(reset.shape, style);
            }
        }
    }
}

/// Highlight of the nearest source.
#[derive(Debug, Clone, Default)]
pub struct SourceHighlight {
    reset: Option<(ShapeId, ShapeStyle)>,
}

impl SourceHighlight {
    pub fn select<R: Renderer>(&mut self, renderer: &mut R, shape: ShapeId) {
        self.clear(renderer);
        let Some(original) = renderer.shape_style(shape) else {
            warn!("Cannot highlight unknown {shape}");
            return;
        };
        let highlighted = ShapeStyle {
            line_color: Color::WHITE,
            fill_color: Color::WHITE,
            opacity: SOURCE_HIGHLIGHT_OPACITY,
            ..original.clone()
        };
        renderer.set_style(shape, highlighted);
        self.reset = Some((shape, original));
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.reset.is_some()
    }

    #[must_use]
    pub fn shape(&self) -> Option<ShapeId> {
        self.reset.as_ref().map(|(shape, _)| *shape)
    }

    /// Restore the line color, fill color, and opacity.
    pub fn clear<R: Renderer>(&mut self, renderer: &mut R) {
        let Some((shape, original)) = self.reset.take() else {
            return;
        };
        if let Some(mut style) = renderer.shape_style(shape) {
            style.line_color = original.line_color;
            style.fill_color = original.fill_color;
            style.opacity = original.opacity;
            renderer.set_style(shape, style);
        }
    }
}

/// Nearest stack to a click, within `max_sep` degrees.
#[must_use]
pub fn nearest_stack(
    table: &StackTable,
    ra: f64,
    dec: f64,
    max_sep: f64,
) -> Option<Neighbor<String>> {
    find_closest(
        ra,
        dec,
        max_sep,
        table.iter(),
        |stack| Some((stack.ra, stack.dec)),
        |stack| stack.id.clone(),
    )
}

/// Stacks within `tolerance` degrees of the stack `center`, excluding it.
#[must_use]
pub fn nearby_stacks(table: &StackTable, center: &str, tolerance: f64) -> Vec<Neighbor<String>> {
    let Some(stack) = table.get(center) else {
        return Vec::new();
    };
    find_nearest(
        stack.ra,
        stack.dec,
        tolerance,
        table.iter().filter(|s| s.id != center),
        |s| Some((s.ra, s.dec)),
        |s| s.id.clone(),
    )
}

/// Nearest of the `shown` rows to a click. Only shown rows are considered.
#[must_use]
pub fn nearest_source(
    rows: &[CatalogRow],
    shown: &[usize],
    ra: f64,
    dec: f64,
) -> Option<Neighbor<usize>> {
    find_closest(
        ra,
        dec,
        180.0,
        shown.iter().copied(),
        |i| rows.get(*i).and_then(|row| schema::row_position(row)),
        |i| i,
    )
}

/// Up to `count` shown rows closest to `selected`, excluding it.
#[must_use]
pub fn nearby_sources(
    rows: &[CatalogRow],
    shown: &[usize],
    selected: usize,
    count: usize,
) -> Vec<Neighbor<usize>> {
    let Some((ra, dec)) = rows.get(selected).and_then(|row| schema::row_position(row)) else {
        return Vec::new();
    };
    let mut found = find_nearest(
        ra,
        dec,
        180.0,
        shown.iter().copied().filter(|i| *i != selected),
        |i| rows.get(*i).and_then(|row| schema::row_position(row)),
        |i| i,
    );
    found.truncate(count);
    found
}

/// Region polygon drawn one vertex per click.
#[derive(Debug, Clone, Default)]
pub struct PolygonBuilder {
    polygon: Option<ShapeId>,
    marker: Option<ShapeId>,
    vertices: Vec<(f64, f64)>,
}

impl PolygonBuilder {
    /// Append a vertex, creating the polygon and start marker on the
    /// first click. Returns the vertex count.
    pub fn add_vertex<R: Renderer>(&mut self, renderer: &mut R, ra: f64, dec: f64) -> usize {
        if self.polygon.is_none() {
            let polygon = renderer.create_shape(ShapeSpec {
                geometry: Geometry::Polygon { points: Vec::new() },
                style: ShapeStyle {
                    fill: true,
                    opacity: 0.2,
                    ..ShapeStyle::default()
                },
            });
            renderer.add_annotation(polygon);

            let marker = renderer.create_shape(ShapeSpec {
                geometry: Geometry::Circle {
                    ra,
                    dec,
                    radius: POLYGON_MARKER_RADIUS,
                },
                style: ShapeStyle {
                    fill: true,
                    ..ShapeStyle::default()
                },
            });
            renderer.add_annotation(marker);

            self.polygon = Some(polygon);
            self.marker = Some(marker);
        }

        if let Some(polygon) = self.polygon {
            renderer.add_point(polygon, ra, dec);
        }
        self.vertices.push((ra, dec));
        self.vertices.len()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn can_finish(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// The vertices of a polygon with at least three of them.
    #[must_use]
    pub fn finish(&self) -> Option<&[(f64, f64)]> {
        self.can_finish().then_some(self.vertices.as_slice())
    }

    /// Remove the polygon and marker and start over.
    pub fn clear<R: Renderer>(&mut self, renderer: &mut R) {
        for shape in [self.polygon.take(), self.marker.take()].into_iter().flatten() {
            renderer.remove_annotation(shape);
            renderer.release_shape(shape);
        }
        self.vertices.clear();
    }
}
