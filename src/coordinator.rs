//! Keeps the map and the chart in step with the expressed attribute and
//! cross-highlights both when a region is hovered.

use crate::classify::ColorScale;
use crate::config::{AppConfig, Theme, TransitionConfig, ViewportConfig};
use crate::projection::Projection;
use crate::render::{CanvasId, ElementHandle, InfoLabel, Renderer, StrokeStyle, StyleAttrs};
use crate::selection::{InvalidSelection, SelectionState};
use crate::types::{Dataset, RegionKey};
use crate::view::chart::BarTiming;
use crate::view::{ChartView, ElementRegistry, MapView};
use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info};

const LABEL_OFFSET_X: f64 = 10.0;
const LABEL_OFFSET_ABOVE: f64 = 75.0;
const LABEL_OFFSET_BELOW: f64 = 25.0;
const LABEL_EDGE_MARGIN: f64 = 20.0;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    InvalidSelection(#[from] InvalidSelection),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Update commands are being issued for a selection change.
    Transitioning,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerKind {
    Over,
    Out,
    Move,
}

/// Pointer event delivered by the host toolkit for a drawn element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub target: ElementHandle,
    /// Pointer position in viewport pixels.
    pub client: [f64; 2],
}

pub struct Coordinator<R: Renderer> {
    renderer: R,
    dataset: Dataset,
    join_key: String,
    name_field: String,
    selection: SelectionState,
    scale: ColorScale,
    theme: Theme,
    transitions: TransitionConfig,
    viewport: ViewportConfig,
    registry: ElementRegistry,
    map: MapView,
    chart: ChartView,
    label: Option<InfoLabel>,
    hovered: Option<RegionKey>,
    phase: Phase,
}

impl<R: Renderer> Coordinator<R> {
    /// Draws both views for an already joined dataset, expressing the first
    /// configured attribute.
    pub fn new(mut renderer: R, dataset: Dataset, config: &AppConfig) -> Result<Self> {
        let selection = SelectionState::new(config.attribute_set()?);
        let theme = config.style.theme()?;
        let scale =
            ColorScale::from_records(&dataset.records, selection.expressed(), theme.palette);
        let projection = Projection::new(&config.projection, config.map.width, config.map.height);
        let mut registry = ElementRegistry::new();

        let map = MapView::draw(
            &mut renderer,
            &mut registry,
            &config.map,
            &projection,
            &dataset.background,
            &dataset.regions,
            &selection,
            &scale,
            &theme,
        );
        let chart = ChartView::draw(
            &mut renderer,
            &mut registry,
            &config.chart,
            &dataset.records,
            &config.data.join_key,
            &selection,
            &scale,
        );

        info!(
            regions = map.regions().len(),
            bars = chart.bars().len(),
            attribute = selection.expressed(),
            "views drawn"
        );

        Ok(Self {
            renderer,
            dataset,
            join_key: config.data.join_key.clone(),
            name_field: config.data.name_field.clone(),
            selection,
            scale,
            theme,
            transitions: config.transitions.clone(),
            viewport: config.viewport.clone(),
            registry,
            map,
            chart,
            label: None,
            hovered: None,
            phase: Phase::Idle,
        })
    }

    /// Expresses `name` in both views. Reselecting the current attribute
    /// reruns the full update.
    pub fn select_attribute(&mut self, name: &str) -> Result<(), CoordinatorError> {
        self.selection.select(name)?;
        self.phase = Phase::Transitioning;

        self.scale = ColorScale::from_records(&self.dataset.records, name, self.theme.palette);
        debug!(attribute = name, breaks = ?self.scale.thresholds(), "color scale rebuilt");

        self.map.recolor(
            &mut self.renderer,
            &self.dataset.regions,
            &self.selection,
            &self.scale,
            self.transitions.map_duration_ms,
        );
        self.chart.update(
            &mut self.renderer,
            &self.dataset.records,
            &self.selection,
            &self.scale,
            Some(BarTiming {
                duration_ms: self.transitions.bar_duration_ms,
                stagger_ms: self.transitions.bar_stagger_ms,
            }),
        );

        // A label left open would show the previous attribute.
        if let Some(open) = self.label.clone() {
            self.show_label_for(&open.region);
            if let Some(label) = self.label.as_mut() {
                label.position = open.position;
                self.renderer.show_label(label);
            }
        }

        self.phase = Phase::Idle;
        info!(attribute = name, "attribute expressed");
        Ok(())
    }

    /// Highlights the map shape and bar of `region` and opens its label.
    pub fn hover(&mut self, region: &RegionKey) {
        let highlight = StyleAttrs::default().stroke(StrokeStyle::new(
            self.theme.highlight_stroke,
            self.theme.highlight_stroke_width,
        ));
        for handle in self.registry.elements_for(region) {
            self.renderer.restyle(*handle, &highlight);
        }
        self.show_label_for(region);
        self.hovered = Some(region.clone());
        debug!(region = %region, "hover");
    }

    /// Restores the captured stroke of every element of `region` and removes
    /// the label.
    pub fn unhover(&mut self, region: &RegionKey) {
        for handle in self.registry.elements_for(region) {
            if let Some(original) = self.registry.original_stroke(*handle) {
                self.renderer
                    .restyle(*handle, &StyleAttrs::default().stroke(original));
            }
        }
        if self.label.take().is_some() {
            self.renderer.hide_label();
        }
        if self.hovered.as_ref() == Some(region) {
            self.hovered = None;
        }
        debug!(region = %region, "unhover");
    }

    /// Moves the label next to the pointer, flipping it left near the right
    /// edge and below the pointer near the top edge.
    pub fn move_label(&mut self, x: f64, y: f64) {
        self.place_label(x, y);
    }

    /// Entry point for per-element pointer subscriptions.
    pub fn dispatch(&mut self, event: PointerEvent) {
        let [x, y] = event.client;
        match event.kind {
            PointerKind::Over => {
                if let Some(region) = self.registry.region_of(event.target).cloned() {
                    self.hover(&region);
                    self.move_label(x, y);
                }
            }
            PointerKind::Out => {
                if let Some(region) = self.registry.region_of(event.target).cloned() {
                    self.unhover(&region);
                }
            }
            PointerKind::Move => self.move_label(x, y),
        }
    }

    /// Turns raw pointer motion over a canvas into hover, unhover and label
    /// moves. `local` is canvas-relative, `client` is in viewport pixels.
    pub fn pointer_moved(&mut self, canvas: CanvasId, local: [f64; 2], client: [f64; 2]) {
        let picked = if canvas == self.map.canvas() {
            self.map.pick(local[0], local[1]).cloned()
        } else if canvas == self.chart.canvas() {
            self.chart.pick(local[0], local[1]).cloned()
        } else {
            None
        };

        if picked != self.hovered {
            if let Some(previous) = self.hovered.take() {
                self.unhover(&previous);
            }
            if let Some(region) = &picked {
                self.hover(region);
            }
        }
        if self.hovered.is_some() {
            self.move_label(client[0], client[1]);
        }
    }

    fn show_label_for(&mut self, region: &RegionKey) {
        let expressed = self.selection.expressed();
        let feature = self.dataset.regions.iter().find(|f| &f.key == region);
        let record = self
            .dataset
            .records
            .iter()
            .find(|r| r.get(&self.join_key) == Some(region.as_str()));

        let value = feature
            .and_then(|f| f.value(expressed))
            .or_else(|| record.and_then(|r| r.value(expressed)));
        let name = feature
            .and_then(|f| f.name.clone())
            .or_else(|| record.and_then(|r| r.get(&self.name_field)).map(str::to_string))
            .unwrap_or_else(|| region.to_string());

        let label = InfoLabel {
            id: format!("{region}_label"),
            region: region.clone(),
            value: format_value(value),
            attribute: expressed.to_string(),
            name,
            position: None,
        };
        self.renderer.show_label(&label);
        self.label = Some(label);
    }

    fn place_label(&mut self, x: f64, y: f64) {
        let Some(label) = self.label.as_mut() else {
            return;
        };
        let width = self.renderer.measure_label(label);

        let left = if x > self.viewport.width - width - LABEL_EDGE_MARGIN {
            x - width - LABEL_OFFSET_X
        } else {
            x + LABEL_OFFSET_X
        };
        let top = if y < LABEL_OFFSET_ABOVE {
            y + LABEL_OFFSET_BELOW
        } else {
            y - LABEL_OFFSET_ABOVE
        };

        label.position = Some([left, top]);
        self.renderer.show_label(label);
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn scale(&self) -> &ColorScale {
        &self.scale
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn label(&self) -> Option<&InfoLabel> {
        self.label.as_ref()
    }

    pub fn map(&self) -> &MapView {
        &self.map
    }

    pub fn chart(&self) -> &ChartView {
        &self.chart
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => "No data".to_string(),
    }
}
