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

//! Renderer abstraction.
//!
//! The sky-rendering engine is an external collaborator. This module
//! describes the small set of operations the engine must provide (moving
//! the view, creating shapes, registering them for display) and ships an
//! in-memory implementation used by the headless front end and by tests.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use crate::view::ViewState;

/// Handle to a shape created by a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u64);

impl ShapeId {
    /// Raw numeric value of the handle.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// A line or fill color understood by the renderer.
///
/// Either a CSS color name or a `#rgb` / `#rrggbb` hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Color(Cow<'static, str>);

const NAMED_COLORS: &[&str] = &[
    "black", "blue", "cyan", "darkblue", "gold", "green", "grey", "gray", "magenta", "orange",
    "pink", "purple", "red", "white", "yellow",
];

impl Color {
    pub const CYAN: Self = Self(Cow::Borrowed("cyan"));
    pub const GOLD: Self = Self(Cow::Borrowed("gold"));
    pub const GREEN: Self = Self(Cow::Borrowed("green"));
    pub const GREY: Self = Self(Cow::Borrowed("grey"));
    pub const ORANGE: Self = Self(Cow::Borrowed("orange"));
    pub const PINK: Self = Self(Cow::Borrowed("pink"));
    pub const WHITE: Self = Self(Cow::Borrowed("white"));

    /// Validate a user supplied color.
    ///
    /// Accepts the known color names, `#` followed by three or six hex
    /// digits, or the bare hex digits (as produced by a color picker).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let lower = text.to_ascii_lowercase();

        if let Some(name) = NAMED_COLORS.iter().find(|n| **n == lower) {
            return Some(Self(Cow::Borrowed(name)));
        }

        let hex = lower.strip_prefix('#').unwrap_or(&lower);
        if matches!(hex.len(), 3 | 6) && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(Cow::Owned(format!("#{hex}"))))
        } else {
            debug!("Rejected color: {text}");
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual attributes of a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeStyle {
    pub line_color: Color,
    pub line_width: f64,
    pub fill_color: Color,
    /// Whether the interior is painted.
    pub fill: bool,
    pub opacity: f64,
    /// Optional label; the catalog overlay uses it to tag unprocessed rows.
    pub label: Option<String>,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            line_color: Color::WHITE,
            line_width: 1.0,
            fill_color: Color::WHITE,
            fill: false,
            opacity: 1.0,
            label: None,
        }
    }
}

/// Geometry of a shape. Positions are (ra, dec) in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Sky-relative circle; the radius is in degrees.
    Circle { ra: f64, dec: f64, radius: f64 },
    /// Closed polygon.
    Polygon { points: Vec<(f64, f64)> },
    /// Open polyline.
    Polyline { points: Vec<(f64, f64)> },
}

/// Everything needed to create a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSpec {
    pub geometry: Geometry,
    pub style: ShapeStyle,
}

/// Operations consumed from the sky-rendering engine.
pub trait Renderer {
    /// Move the view to the given center and field of view.
    fn goto(&mut self, ra: f64, dec: f64, fov: f64, animate: bool);

    /// Current view center and field of view.
    fn view(&self) -> ViewState;

    /// Create a shape. The shape is not displayed until it is added.
    fn create_shape(&mut self, spec: ShapeSpec) -> ShapeId;

    /// Current style of a shape, if the handle is known.
    fn shape_style(&self, id: ShapeId) -> Option<ShapeStyle>;

    /// Replace the style of a shape.
    fn set_style(&mut self, id: ShapeId, style: ShapeStyle);

    /// Change the radius of a circle.
    fn set_radius(&mut self, id: ShapeId, radius: f64);

    /// Append a vertex to a polygon or polyline.
    fn add_point(&mut self, id: ShapeId, ra: f64, dec: f64);

    /// Register a shape for display. Returns `false` if it was already shown.
    fn add_annotation(&mut self, id: ShapeId) -> bool;

    /// Unregister a shape. Returns `false` if it was not shown.
    fn remove_annotation(&mut self, id: ShapeId) -> bool;

    /// Forget a shape entirely. The handle must not be used afterwards.
    fn release_shape(&mut self, id: ShapeId);

    /// Select the foreground image layer by its full name, with an opacity
    /// in percent. `None` leaves the current image and only sets opacity.
    fn set_foreground(&mut self, image: Option<&str>, opacity: f64);
}

#[derive(Debug, Clone)]
struct ShapeEntry {
    spec: ShapeSpec,
    shown: bool,
}

/// In-memory renderer: a shape registry plus a view.
#[derive(Debug, Clone)]
pub struct MemoryRenderer {
    shapes: HashMap<ShapeId, ShapeEntry>,
    next_id: u64,
    view: ViewState,
    foreground: Option<String>,
    foreground_opacity: f64,
}

impl MemoryRenderer {
    #[must_use]
    pub fn new(view: ViewState) -> Self {
        Self {
            shapes: HashMap::new(),
            next_id: 1,
            view,
            foreground: None,
            foreground_opacity: 100.0,
        }
    }

    /// Number of shapes currently registered for display.
    #[must_use]
    pub fn shown_count(&self) -> usize {
        self.shapes.values().filter(|e| e.shown).count()
    }

    /// Number of live shape handles.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_shown(&self, id: ShapeId) -> bool {
        self.shapes.get(&id).is_some_and(|e| e.shown)
    }

    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&ShapeSpec> {
        self.shapes.get(&id).map(|e| &e.spec)
    }

    /// Shown shapes in creation order.
    #[must_use]
    pub fn shown_shapes(&self) -> Vec<(ShapeId, &ShapeSpec)> {
        let mut shown: Vec<_> = self
            .shapes
            .iter()
            .filter(|(_, e)| e.shown)
            .map(|(id, e)| (*id, &e.spec))
            .collect();
        shown.sort_by_key(|(id, _)| *id);
        shown
    }

    #[must_use]
    pub fn foreground(&self) -> (Option<&str>, f64) {
        (self.foreground.as_deref(), self.foreground_opacity)
    }
}

impl Default for MemoryRenderer {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}

impl Renderer for MemoryRenderer {
    fn goto(&mut self, ra: f64, dec: f64, fov: f64, _animate: bool) {
        self.view = ViewState { ra, dec, fov };
    }

    fn view(&self) -> ViewState {
        self.view
    }

    fn create_shape(&mut self, spec: ShapeSpec) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.shapes.insert(id, ShapeEntry { spec, shown: false });
        id
    }

    fn shape_style(&self, id: ShapeId) -> Option<ShapeStyle> {
        self.shapes.get(&id).map(|e| e.spec.style.clone())
    }

    fn set_style(&mut self, id: ShapeId, style: ShapeStyle) {
        match self.shapes.get_mut(&id) {
            Some(entry) => entry.spec.style = style,
            None => warn!("set_style on unknown {id}"),
        }
    }

    fn set_radius(&mut self, id: ShapeId, radius: f64) {
        match self.shapes.get_mut(&id).map(|e| &mut e.spec.geometry) {
            Some(Geometry::Circle { radius: r, .. }) => *r = radius,
            Some(_) => warn!("set_radius on non-circle {id}"),
            None => warn!("set_radius on unknown {id}"),
        }
    }

    fn add_point(&mut self, id: ShapeId, ra: f64, dec: f64) {
        match self.shapes.get_mut(&id).map(|e| &mut e.spec.geometry) {
            Some(Geometry::Polygon { points } | Geometry::Polyline { points }) => {
                points.push((ra, dec));
            }
            Some(Geometry::Circle { .. }) => warn!("add_point on circle {id}"),
            None => warn!("add_point on unknown {id}"),
        }
    }

    fn add_annotation(&mut self, id: ShapeId) -> bool {
        match self.shapes.get_mut(&id) {
            Some(entry) if !entry.shown => {
                entry.shown = true;
                true
            }
            _ => false,
        }
    }

    fn remove_annotation(&mut self, id: ShapeId) -> bool {
        match self.shapes.get_mut(&id) {
            Some(entry) if entry.shown => {
                entry.shown = false;
                true
            }
            _ => false,
        }
    }

    fn release_shape(&mut self, id: ShapeId) {
        self.shapes.remove(&id);
    }

    fn set_foreground(&mut self, image: Option<&str>, opacity: f64) {
        if let Some(image) = image {
            self.foreground = Some(image.to_owned());
        }
        self.foreground_opacity = opacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle() -> ShapeSpec {
        ShapeSpec {
            geometry: Geometry::Circle {
                ra: 10.0,
                dec: 20.0,
                radius: 0.01,
            },
            style: ShapeStyle::default(),
        }
    }

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse("Cyan"), Some(Color::CYAN));
        assert_eq!(Color::parse("ff00aa").unwrap().as_str(), "#ff00aa");
        assert_eq!(Color::parse("#FFF").unwrap().as_str(), "#fff");
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_add_remove_idempotent() {
        let mut r = MemoryRenderer::default();
        let id = r.create_shape(circle());
        assert!(!r.is_shown(id));

        assert!(r.add_annotation(id));
        assert!(!r.add_annotation(id));
        assert_eq!(r.shown_count(), 1);

        assert!(r.remove_annotation(id));
        assert!(!r.remove_annotation(id));
        assert_eq!(r.shown_count(), 0);
        assert_eq!(r.shape_count(), 1);

        r.release_shape(id);
        assert_eq!(r.shape_count(), 0);
        assert!(!r.add_annotation(id));
    }

    #[test]
    fn test_set_radius_and_points() {
        let mut r = MemoryRenderer::default();
        let c = r.create_shape(circle());
        r.set_radius(c, 0.5);
        assert!(matches!(
            r.shape(c).unwrap().geometry,
            Geometry::Circle { radius, .. } if (radius - 0.5).abs() < f64::EPSILON
        ));

        let p = r.create_shape(ShapeSpec {
            geometry: Geometry::Polygon { points: Vec::new() },
            style: ShapeStyle::default(),
        });
        r.add_point(p, 1.0, 2.0);
        r.add_point(p, 3.0, 4.0);
        assert!(matches!(
            &r.shape(p).unwrap().geometry,
            Geometry::Polygon { points } if points.len() == 2
        ));
    }

    #[test]
    fn test_goto_updates_view() {
        let mut r = MemoryRenderer::default();
        r.goto(84.67665, -69.1009, 5.0, false);
        let v = r.view();
        assert!((v.ra - 84.67665).abs() < 1e-12);
        assert!((v.fov - 5.0).abs() < 1e-12);
    }
}
