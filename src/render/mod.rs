//! Contract between the views and whatever actually draws.
//!
//! Views only map data to visual attributes; a `Renderer` owns the elements,
//! animates transitions and shows the floating label.

pub mod raster;
pub mod scene;

use crate::classify::Color;
use crate::projection::Projection;
use crate::types::RegionKey;
use geo::MultiPolygon;
use std::fmt;

pub use scene::SceneRenderer;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanvasId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Paint {
    None,
    Color(Color),
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Paint::None => f.write_str("none"),
            Paint::Color(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeStyle {
    pub paint: Paint,
    pub width: f64,
}

impl StrokeStyle {
    pub const NONE: StrokeStyle = StrokeStyle {
        paint: Paint::None,
        width: 0.0,
    };

    pub fn new(color: Color, width: f64) -> Self {
        Self {
            paint: Paint::Color(color),
            width,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Partial set of visual attributes. `None` fields are left untouched when
/// applied to an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleAttrs {
    pub fill: Option<Paint>,
    pub stroke: Option<StrokeStyle>,
    pub rect: Option<ScreenRect>,
}

impl StyleAttrs {
    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(Paint::Color(color));
        self
    }

    pub fn no_fill(mut self) -> Self {
        self.fill = Some(Paint::None);
        self
    }

    pub fn stroke(mut self, stroke: StrokeStyle) -> Self {
        self.stroke = Some(stroke);
        self
    }

    pub fn rect(mut self, rect: ScreenRect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Overlays every attribute set on `other`.
    pub fn apply(&mut self, other: &StyleAttrs) {
        if let Some(fill) = other.fill {
            self.fill = Some(fill);
        }
        if let Some(stroke) = other.stroke {
            self.stroke = Some(stroke);
        }
        if let Some(rect) = other.rect {
            self.rect = Some(rect);
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// Projected geometry in screen pixels.
    Path(MultiPolygon<f64>),
    Rect(ScreenRect),
    Text { at: [f64; 2], anchor: TextAnchor },
}

/// The single floating label shown while a region is hovered.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoLabel {
    pub id: String,
    pub region: RegionKey,
    /// Formatted value of the expressed attribute.
    pub value: String,
    pub attribute: String,
    pub name: String,
    /// Top-left corner in viewport pixels, once the pointer has moved.
    pub position: Option<[f64; 2]>,
}

impl InfoLabel {
    /// Rough width for renderers that cannot measure text.
    pub fn estimated_width(&self) -> f64 {
        let chars = self
            .value
            .chars()
            .count()
            .max(self.attribute.chars().count())
            .max(self.name.chars().count());
        chars as f64 * 9.0 + 20.0
    }
}

pub trait Renderer {
    fn create_canvas(&mut self, width: f64, height: f64, class: &str) -> CanvasId;

    fn project_path(&self, projection: &Projection, geometry: &MultiPolygon<f64>) -> Drawable {
        Drawable::Path(projection.project_geometry(geometry))
    }

    fn draw_shape(
        &mut self,
        canvas: CanvasId,
        drawable: Drawable,
        class: &str,
        style: &StyleAttrs,
    ) -> ElementHandle;

    fn draw_text(
        &mut self,
        canvas: CanvasId,
        text: &str,
        at: [f64; 2],
        anchor: TextAnchor,
        class: &str,
    ) -> ElementHandle;

    fn set_text(&mut self, handle: ElementHandle, text: &str);

    /// Animates `handle` towards `style`. A later transition on the same
    /// element interrupts an earlier one.
    fn transition(
        &mut self,
        handle: ElementHandle,
        style: &StyleAttrs,
        duration_ms: u64,
        delay_ms: u64,
    );

    /// Applies `style` immediately.
    fn restyle(&mut self, handle: ElementHandle, style: &StyleAttrs) {
        self.transition(handle, style, 0, 0);
    }

    /// Creates or repositions the floating label.
    fn show_label(&mut self, label: &InfoLabel);

    fn hide_label(&mut self);

    fn measure_label(&self, label: &InfoLabel) -> f64 {
        label.estimated_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_only_overwrites_set_fields() {
        let mut base = StyleAttrs::default()
            .fill(Color::NO_DATA)
            .stroke(StrokeStyle::new(Color::BLACK, 0.5));
        base.apply(&StyleAttrs::default().stroke(StrokeStyle::new(Color::BLUE, 2.0)));
        assert_eq!(base.fill, Some(Paint::Color(Color::NO_DATA)));
        assert_eq!(base.stroke, Some(StrokeStyle::new(Color::BLUE, 2.0)));
        assert_eq!(Paint::None.to_string(), "none");
    }
}
