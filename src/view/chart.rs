use super::{ElementRegistry, RegionIndex};
use crate::classify::{choropleth, Color, ColorScale};
use crate::config::ChartConfig;
use crate::render::{
    CanvasId, Drawable, ElementHandle, Renderer, ScreenRect, StrokeStyle, StyleAttrs, TextAnchor,
};
use crate::selection::SelectionState;
use crate::types::{RegionKey, TabularRecord};
use geo::{Coord, MultiPolygon, Rect};
use std::cmp::Ordering;
use tracing::debug;

const CHART_BACKGROUND: Color = Color::rgb(0xf7, 0xf7, 0xf7);

/// Maps `domain` linearly onto `range`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearScale {
    pub domain: [f64; 2],
    pub range: [f64; 2],
}

impl LinearScale {
    pub fn apply(&self, value: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BarTiming {
    pub duration_ms: u64,
    /// Delay added per sort rank.
    pub stagger_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub key: RegionKey,
    pub handle: ElementHandle,
    /// Index into the record slice the view was drawn from.
    pub record: usize,
}

/// One bar per region, sorted descending by the expressed attribute.
#[derive(Debug)]
pub struct ChartView {
    canvas: CanvasId,
    layout: ChartConfig,
    bars: Vec<Bar>,
    /// Bar indices in display order.
    order: Vec<usize>,
    title: ElementHandle,
    ticks: Vec<ElementHandle>,
    index: RegionIndex,
}

impl ChartView {
    pub fn draw<R: Renderer>(
        renderer: &mut R,
        registry: &mut ElementRegistry,
        layout: &ChartConfig,
        records: &[TabularRecord],
        join_key: &str,
        selection: &SelectionState,
        scale: &ColorScale,
    ) -> Self {
        let canvas = renderer.create_canvas(layout.width, layout.height, "chart");
        let inner = ScreenRect {
            x: layout.left_padding,
            y: layout.top_bottom_padding,
            width: layout.inner_width(),
            height: layout.inner_height(),
        };

        renderer.draw_shape(
            canvas,
            Drawable::Rect(inner),
            "chartBackground",
            &StyleAttrs::default().fill(CHART_BACKGROUND),
        );

        let mut bars = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let Some(key) = record.get(join_key) else {
                continue;
            };
            let key = RegionKey::from(key);
            let handle = renderer.draw_shape(
                canvas,
                Drawable::Rect(ScreenRect {
                    x: 0.0,
                    y: 0.0,
                    width: 0.0,
                    height: 0.0,
                }),
                &format!("bar {key}"),
                &StyleAttrs::default().stroke(StrokeStyle::NONE),
            );
            registry.register(handle, key.clone(), StrokeStyle::NONE);
            bars.push(Bar {
                key,
                handle,
                record: i,
            });
        }

        let title = renderer.draw_text(canvas, "", [40.0, 40.0], TextAnchor::Start, "chartTitle");

        let ticks = (0..=layout.ticks)
            .map(|k| {
                let y = layout.top_bottom_padding
                    + inner.height * (1.0 - k as f64 / layout.ticks.max(1) as f64);
                renderer.draw_text(
                    canvas,
                    "",
                    [layout.left_padding - 4.0, y],
                    TextAnchor::End,
                    "axis",
                )
            })
            .collect();

        renderer.draw_shape(
            canvas,
            Drawable::Rect(inner),
            "chartFrame",
            &StyleAttrs::default()
                .no_fill()
                .stroke(StrokeStyle::new(Color::BLACK, 1.0)),
        );

        let mut view = Self {
            canvas,
            layout: layout.clone(),
            bars,
            order: Vec::new(),
            title,
            ticks,
            index: RegionIndex::build(Vec::new()),
        };
        view.update(renderer, records, selection, scale, None);
        view
    }

    /// Re-sorts, repositions, resizes and recolors every bar. Without timing
    /// the new attributes apply immediately; with timing each bar's transition
    /// is delayed by its new rank.
    pub fn update<R: Renderer>(
        &mut self,
        renderer: &mut R,
        records: &[TabularRecord],
        selection: &SelectionState,
        scale: &ColorScale,
        timing: Option<BarTiming>,
    ) {
        let expressed = selection.expressed();
        let value_of = |bar: &Bar| {
            records
                .get(bar.record)
                .and_then(|r| r.value(expressed))
                .filter(|v| v.is_finite())
        };

        let values: Vec<Option<f64>> = self.bars.iter().map(value_of).collect();
        let mut order: Vec<usize> = (0..self.bars.len()).collect();
        order.sort_by(|&a, &b| descending(values[a], values[b]));

        let y_scale = self.y_scale(&values);
        let n = self.bars.len().max(1) as f64;
        let slot = self.layout.inner_width() / n;
        let width = (slot - self.layout.gutter).max(0.0);
        let inner_height = self.layout.inner_height();
        let pad = self.layout.top_bottom_padding;
        let baseline = y_scale.apply(0.0).clamp(0.0, inner_height);

        let mut shapes = Vec::with_capacity(order.len());
        for (rank, &bar_idx) in order.iter().enumerate() {
            let bar = &self.bars[bar_idx];
            let value = values[bar_idx];
            let end = value.map_or(baseline, |v| y_scale.apply(v).clamp(0.0, inner_height));
            let rect = ScreenRect {
                x: rank as f64 * slot + self.layout.left_padding,
                y: end.min(baseline) + pad,
                width,
                height: (baseline - end).abs(),
            };
            let style = StyleAttrs::default()
                .rect(rect)
                .fill(choropleth(value, scale));

            match timing {
                Some(t) => renderer.transition(
                    bar.handle,
                    &style,
                    t.duration_ms,
                    rank as u64 * t.stagger_ms,
                ),
                None => renderer.restyle(bar.handle, &style),
            }
            shapes.push((bar.key.clone(), rect_polygon(rect)));
        }

        renderer.set_text(self.title, &self.layout.title.replace("{attribute}", expressed));
        let steps = self.ticks.len().saturating_sub(1).max(1) as f64;
        let [y_min, y_max] = y_scale.domain;
        for (k, handle) in self.ticks.iter().enumerate() {
            let value = y_min + (y_max - y_min) * k as f64 / steps;
            renderer.set_text(*handle, &format_tick(value));
        }

        debug!(attribute = expressed, bars = order.len(), "chart updated");
        self.order = order;
        self.index = RegionIndex::build(shapes);
    }

    /// Domain always includes zero so bars grow from a shared baseline;
    /// negative values extend it downward.
    fn y_scale(&self, values: &[Option<f64>]) -> LinearScale {
        let (min, max) = values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let y_min = if min < 0.0 { min * 1.1 } else { 0.0 };
        let y_max = self
            .layout
            .y_max
            .unwrap_or(if max > 0.0 { max * 1.1 } else { 0.0 });
        let y_max = if y_max > y_min { y_max } else { y_min + 1.0 };
        LinearScale {
            domain: [y_min, y_max],
            range: [self.layout.inner_height(), 0.0],
        }
    }

    pub fn canvas(&self) -> CanvasId {
        self.canvas
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn title(&self) -> ElementHandle {
        self.title
    }

    pub fn ticks(&self) -> &[ElementHandle] {
        &self.ticks
    }

    /// Region keys in current display order, left to right.
    pub fn order(&self) -> Vec<RegionKey> {
        self.order
            .iter()
            .map(|&i| self.bars[i].key.clone())
            .collect()
    }

    pub fn pick(&self, x: f64, y: f64) -> Option<&RegionKey> {
        self.index.locate(x, y)
    }
}

/// Larger values first; missing values sink to the end in input order.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn rect_polygon(r: ScreenRect) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new(
        Coord { x: r.x, y: r.y },
        Coord {
            x: r.x + r.width,
            y: r.y + r.height,
        },
    )
    .to_polygon()])
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Palette;
    use crate::render::{Paint, SceneRenderer};
    use crate::types::AttributeSet;

    fn records() -> Vec<TabularRecord> {
        vec![
            TabularRecord::from_pairs([("code", "low"), ("a", "10"), ("b", "3")]),
            TabularRecord::from_pairs([("code", "high"), ("a", "90"), ("b", "1")]),
            TabularRecord::from_pairs([("code", "mid"), ("a", "50"), ("b", "x")]),
        ]
    }

    fn layout() -> ChartConfig {
        ChartConfig {
            width: 327.0,
            height: 110.0,
            left_padding: 25.0,
            right_padding: 2.0,
            top_bottom_padding: 5.0,
            gutter: 1.0,
            y_max: Some(100.0),
            title: "{attribute} per region".to_string(),
            ticks: 5,
        }
    }

    #[test]
    fn bars_sort_descending_and_size_from_linear_scale() {
        let mut scene = SceneRenderer::new();
        let mut registry = ElementRegistry::new();
        let records = records();
        let selection = SelectionState::new(AttributeSet::new(["a", "b"]).unwrap());
        let scale = ColorScale::from_records(&records, "a", Palette::default());

        let chart = ChartView::draw(
            &mut scene,
            &mut registry,
            &layout(),
            &records,
            "code",
            &selection,
            &scale,
        );

        let order: Vec<String> = chart.order().iter().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);

        // inner width 300 over 3 bars, inner height 100 over a 0..100 domain.
        let high = scene.element(chart.bars()[1].handle).unwrap();
        let rect = high.style.rect.unwrap();
        assert_eq!(rect.x, 25.0);
        assert_eq!(rect.width, 99.0);
        assert!((rect.height - 90.0).abs() < 1e-9);
        assert!((rect.y - 15.0).abs() < 1e-9);

        let title = scene.element(chart.title()).unwrap();
        assert_eq!(title.text.as_deref(), Some("a per region"));
        let top_tick = scene.element(*chart.ticks().last().unwrap()).unwrap();
        assert_eq!(top_tick.text.as_deref(), Some("100"));
    }

    #[test]
    fn missing_values_sink_to_the_end_with_no_data_fill() {
        let mut scene = SceneRenderer::new();
        let mut registry = ElementRegistry::new();
        let records = records();
        let mut selection = SelectionState::new(AttributeSet::new(["a", "b"]).unwrap());
        selection.select("b").unwrap();
        let scale = ColorScale::from_records(&records, "b", Palette::default());

        let chart = ChartView::draw(
            &mut scene,
            &mut registry,
            &layout(),
            &records,
            "code",
            &selection,
            &scale,
        );

        let order: Vec<String> = chart.order().iter().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["low", "high", "mid"]);
        let mid = scene.element(chart.bars()[2].handle).unwrap();
        assert_eq!(mid.style.fill, Some(Paint::Color(Color::NO_DATA)));
        assert_eq!(mid.style.rect.unwrap().height, 0.0);
    }

    #[test]
    fn staggered_update_delays_by_rank() {
        let mut scene = SceneRenderer::new();
        let mut registry = ElementRegistry::new();
        let records = records();
        let selection = SelectionState::new(AttributeSet::new(["a"]).unwrap());
        let scale = ColorScale::from_records(&records, "a", Palette::default());
        let mut chart = ChartView::draw(
            &mut scene,
            &mut registry,
            &layout(),
            &records,
            "code",
            &selection,
            &scale,
        );

        chart.update(
            &mut scene,
            &records,
            &selection,
            &scale,
            Some(BarTiming {
                duration_ms: 500,
                stagger_ms: 20,
            }),
        );

        let delays: Vec<u64> = ["high", "mid", "low"]
            .iter()
            .map(|key| {
                let bar = chart
                    .bars()
                    .iter()
                    .find(|b| b.key.as_str() == *key)
                    .unwrap();
                scene.last_transition(bar.handle).unwrap().delay_ms
            })
            .collect();
        assert_eq!(delays, vec![0, 20, 40]);
        assert_eq!(chart.pick(30.0, 100.0), Some(&RegionKey::from("high")));
    }

    #[test]
    fn negative_values_hang_below_the_zero_baseline() {
        let mut scene = SceneRenderer::new();
        let mut registry = ElementRegistry::new();
        let records = vec![
            TabularRecord::from_pairs([("code", "shallow"), ("a", "-10")]),
            TabularRecord::from_pairs([("code", "deep"), ("a", "-50")]),
        ];
        let selection = SelectionState::new(AttributeSet::new(["a"]).unwrap());
        let scale = ColorScale::from_records(&records, "a", Palette::default());
        let chart = ChartView::draw(
            &mut scene,
            &mut registry,
            &ChartConfig {
                y_max: None,
                ..layout()
            },
            &records,
            "code",
            &selection,
            &scale,
        );

        let order: Vec<String> = chart.order().iter().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["shallow", "deep"]);

        // Domain is [-55, 0]: the baseline sits at the top of the plot area.
        let deep = scene.element(chart.bars()[1].handle).unwrap().style.rect.unwrap();
        let shallow = scene.element(chart.bars()[0].handle).unwrap().style.rect.unwrap();
        assert!((deep.y - 5.0).abs() < 1e-9);
        assert!((deep.height - 100.0 * 50.0 / 55.0).abs() < 1e-9);
        assert!((shallow.height - 100.0 * 10.0 / 55.0).abs() < 1e-9);

        let bottom_tick = scene.element(chart.ticks()[0]).unwrap();
        let bottom: f64 = bottom_tick.text.as_deref().unwrap().parse().unwrap();
        assert!((bottom + 55.0).abs() < 0.1);
    }

    #[test]
    fn linear_scale_inverts_range() {
        let s = LinearScale {
            domain: [0.0, 100.0],
            range: [463.0, 0.0],
        };
        assert_eq!(s.apply(0.0), 463.0);
        assert_eq!(s.apply(100.0), 0.0);
    }
}
