use super::{
    CanvasId, Drawable, ElementHandle, InfoLabel, Renderer, StyleAttrs, TextAnchor,
};
use geo::MultiPolygon;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneElement {
    pub canvas: CanvasId,
    pub class: String,
    pub drawable: Drawable,
    /// End state of the latest transition.
    pub style: StyleAttrs,
    pub text: Option<String>,
}

impl SceneElement {
    pub fn has_class(&self, class: &str) -> bool {
        self.class.split_whitespace().any(|c| c == class)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub handle: ElementHandle,
    pub style: StyleAttrs,
    pub duration_ms: u64,
    pub delay_ms: u64,
}

/// Retained scene that applies transitions to their end state and can
/// serialize each canvas as SVG.
#[derive(Debug, Default)]
pub struct SceneRenderer {
    canvases: Vec<Canvas>,
    elements: BTreeMap<ElementHandle, SceneElement>,
    in_flight: BTreeMap<ElementHandle, TransitionRecord>,
    label: Option<InfoLabel>,
    next_handle: u64,
}

impl SceneRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canvas(&self, id: CanvasId) -> Option<&Canvas> {
        self.canvases.get(id.0 as usize)
    }

    pub fn element(&self, handle: ElementHandle) -> Option<&SceneElement> {
        self.elements.get(&handle)
    }

    /// Elements of `canvas` in drawing order.
    pub fn elements_on(
        &self,
        canvas: CanvasId,
    ) -> impl Iterator<Item = (ElementHandle, &SceneElement)> + '_ {
        self.elements
            .iter()
            .filter(move |(_, e)| e.canvas == canvas)
            .map(|(h, e)| (*h, e))
    }

    pub fn select_class<'a>(
        &'a self,
        class: &'a str,
    ) -> impl Iterator<Item = (ElementHandle, &'a SceneElement)> + 'a {
        self.elements
            .iter()
            .filter(move |(_, e)| e.has_class(class))
            .map(|(h, e)| (*h, e))
    }

    /// Latest transition issued for an element, if any.
    pub fn last_transition(&self, handle: ElementHandle) -> Option<&TransitionRecord> {
        self.in_flight.get(&handle)
    }

    pub fn label(&self) -> Option<&InfoLabel> {
        self.label.as_ref()
    }

    pub fn to_svg(&self, canvas: CanvasId) -> Option<String> {
        let c = self.canvas(canvas)?;
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="{}" width="{}" height="{}">"#,
            escape(&c.class),
            c.width,
            c.height
        );
        for (_, element) in self.elements_on(canvas) {
            write_element(&mut out, element);
        }
        out.push_str("</svg>\n");
        Some(out)
    }
}

impl Renderer for SceneRenderer {
    fn create_canvas(&mut self, width: f64, height: f64, class: &str) -> CanvasId {
        self.canvases.push(Canvas {
            width,
            height,
            class: class.to_string(),
        });
        CanvasId(self.canvases.len() as u32 - 1)
    }

    fn draw_shape(
        &mut self,
        canvas: CanvasId,
        drawable: Drawable,
        class: &str,
        style: &StyleAttrs,
    ) -> ElementHandle {
        let mut style = style.clone();
        if let Drawable::Rect(rect) = &drawable {
            style.rect.get_or_insert(*rect);
        }
        self.insert(SceneElement {
            canvas,
            class: class.to_string(),
            drawable,
            style,
            text: None,
        })
    }

    fn draw_text(
        &mut self,
        canvas: CanvasId,
        text: &str,
        at: [f64; 2],
        anchor: TextAnchor,
        class: &str,
    ) -> ElementHandle {
        self.insert(SceneElement {
            canvas,
            class: class.to_string(),
            drawable: Drawable::Text { at, anchor },
            style: StyleAttrs::default(),
            text: Some(text.to_string()),
        })
    }

    fn set_text(&mut self, handle: ElementHandle, text: &str) {
        if let Some(e) = self.elements.get_mut(&handle) {
            e.text = Some(text.to_string());
        }
    }

    fn transition(
        &mut self,
        handle: ElementHandle,
        style: &StyleAttrs,
        duration_ms: u64,
        delay_ms: u64,
    ) {
        let Some(e) = self.elements.get_mut(&handle) else {
            return;
        };
        e.style.apply(style);
        self.in_flight.insert(
            handle,
            TransitionRecord {
                handle,
                style: style.clone(),
                duration_ms,
                delay_ms,
            },
        );
    }

    fn show_label(&mut self, label: &InfoLabel) {
        self.label = Some(label.clone());
    }

    fn hide_label(&mut self) {
        self.label = None;
    }
}

impl SceneRenderer {
    fn insert(&mut self, element: SceneElement) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;
        self.elements.insert(handle, element);
        handle
    }
}

fn write_element(out: &mut String, e: &SceneElement) {
    let mut paint = String::new();
    if let Some(fill) = e.style.fill {
        let _ = write!(paint, r#" fill="{fill}""#);
    }
    if let Some(stroke) = e.style.stroke {
        let _ = write!(
            paint,
            r#" stroke="{}" stroke-width="{}""#,
            stroke.paint, stroke.width
        );
    }

    match &e.drawable {
        Drawable::Path(geometry) => {
            let _ = writeln!(
                out,
                r#"  <path class="{}" d="{}" fill-rule="evenodd"{paint}/>"#,
                escape(&e.class),
                path_data(geometry)
            );
        }
        Drawable::Rect(initial) => {
            let r = e.style.rect.unwrap_or(*initial);
            let _ = writeln!(
                out,
                r#"  <rect class="{}" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"{paint}/>"#,
                escape(&e.class),
                r.x,
                r.y,
                r.width,
                r.height
            );
        }
        Drawable::Text { at, anchor } => {
            let anchor = match anchor {
                TextAnchor::Start => "start",
                TextAnchor::End => "end",
            };
            let _ = writeln!(
                out,
                r#"  <text class="{}" x="{:.2}" y="{:.2}" text-anchor="{anchor}">{}</text>"#,
                escape(&e.class),
                at[0],
                at[1],
                escape(e.text.as_deref().unwrap_or(""))
            );
        }
    }
}

fn path_data(geometry: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for polygon in geometry {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            for (i, c) in ring.coords().enumerate() {
                let cmd = if i == 0 { 'M' } else { 'L' };
                let _ = write!(d, "{cmd}{:.2},{:.2}", c.x, c.y);
            }
            d.push('Z');
        }
    }
    d
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Color;
    use crate::render::{Paint, ScreenRect, StrokeStyle};
    use geo::{polygon, MultiPolygon};

    #[test]
    fn later_transition_replaces_in_flight_one() {
        let mut scene = SceneRenderer::new();
        let canvas = scene.create_canvas(100.0, 100.0, "map");
        let h = scene.draw_shape(
            canvas,
            Drawable::Rect(ScreenRect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            }),
            "bar a",
            &StyleAttrs::default().fill(Color::NO_DATA),
        );

        scene.transition(h, &StyleAttrs::default().fill(Color::BLACK), 500, 40);
        scene.transition(h, &StyleAttrs::default().fill(Color::BLUE), 500, 0);

        let e = scene.element(h).unwrap();
        assert_eq!(e.style.fill, Some(Paint::Color(Color::BLUE)));
        assert_eq!(scene.last_transition(h).unwrap().delay_ms, 0);
        assert_eq!(scene.select_class("a").count(), 1);
    }

    #[test]
    fn svg_contains_paths_rects_and_text() {
        let mut scene = SceneRenderer::new();
        let canvas = scene.create_canvas(200.0, 100.0, "map");
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ]]);
        scene.draw_shape(
            canvas,
            Drawable::Path(square),
            "regions ES-1",
            &StyleAttrs::default()
                .fill(Color::NO_DATA)
                .stroke(StrokeStyle::new(Color::BLACK, 0.5)),
        );
        scene.draw_text(canvas, "a < b", [1.0, 2.0], TextAnchor::Start, "title");

        let svg = scene.to_svg(canvas).unwrap();
        assert!(svg.contains(r#"class="regions ES-1""#));
        assert!(svg.contains(r##"fill="#cccccc""##));
        assert!(svg.contains(r##"stroke="#000000" stroke-width="0.5""##));
        assert!(svg.contains("M0.00,0.00L10.00,0.00"));
        assert!(svg.contains("a &lt; b"));
        assert!(scene.to_svg(CanvasId(7)).is_none());
    }
}
