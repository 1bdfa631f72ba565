use super::{ElementRegistry, RegionIndex};
use crate::classify::{choropleth, ColorScale};
use crate::config::{MapConfig, Theme};
use crate::projection::Projection;
use crate::render::{CanvasId, Drawable, ElementHandle, Renderer, StrokeStyle, StyleAttrs};
use crate::selection::SelectionState;
use crate::types::{GeoFeature, RegionKey};
use geo::MultiPolygon;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct MapRegion {
    pub key: RegionKey,
    pub handle: ElementHandle,
    /// Index into the feature slice the view was drawn from.
    pub feature: usize,
}

/// Background layer plus one colored path per enumeration unit.
#[derive(Debug)]
pub struct MapView {
    canvas: CanvasId,
    background: Vec<ElementHandle>,
    regions: Vec<MapRegion>,
    index: RegionIndex,
}

impl MapView {
    #[allow(clippy::too_many_arguments)]
    pub fn draw<R: Renderer>(
        renderer: &mut R,
        registry: &mut ElementRegistry,
        config: &MapConfig,
        projection: &Projection,
        background: &[MultiPolygon<f64>],
        features: &[GeoFeature],
        selection: &SelectionState,
        scale: &ColorScale,
        theme: &Theme,
    ) -> Self {
        let canvas = renderer.create_canvas(config.width, config.height, "map");

        let background = background
            .iter()
            .map(|geometry| {
                let drawable = renderer.project_path(projection, geometry);
                renderer.draw_shape(
                    canvas,
                    drawable,
                    "countries",
                    &StyleAttrs::default()
                        .fill(theme.background_fill)
                        .stroke(StrokeStyle::new(theme.background_fill, 0.5)),
                )
            })
            .collect();

        let original = StrokeStyle::new(theme.region_stroke, theme.region_stroke_width);
        let expressed = selection.expressed();
        let mut regions = Vec::with_capacity(features.len());
        let mut shapes = Vec::with_capacity(features.len());

        for (i, feature) in features.iter().enumerate() {
            let drawable = renderer.project_path(projection, &feature.geometry);
            if let Drawable::Path(screen) = &drawable {
                shapes.push((feature.key.clone(), screen.clone()));
            }
            let style = StyleAttrs::default()
                .fill(choropleth(feature.value(expressed), scale))
                .stroke(original);
            let handle = renderer.draw_shape(
                canvas,
                drawable,
                &format!("regions {}", feature.key),
                &style,
            );
            registry.register(handle, feature.key.clone(), original);
            regions.push(MapRegion {
                key: feature.key.clone(),
                handle,
                feature: i,
            });
        }

        debug!(regions = regions.len(), "map drawn");

        Self {
            canvas,
            background,
            regions,
            index: RegionIndex::build(shapes),
        }
    }

    /// Recolors every region for the expressed attribute.
    pub fn recolor<R: Renderer>(
        &self,
        renderer: &mut R,
        features: &[GeoFeature],
        selection: &SelectionState,
        scale: &ColorScale,
        duration_ms: u64,
    ) {
        let expressed = selection.expressed();
        for region in &self.regions {
            let value = features.get(region.feature).and_then(|f| f.value(expressed));
            renderer.transition(
                region.handle,
                &StyleAttrs::default().fill(choropleth(value, scale)),
                duration_ms,
                0,
            );
        }
    }

    pub fn canvas(&self) -> CanvasId {
        self.canvas
    }

    pub fn regions(&self) -> &[MapRegion] {
        &self.regions
    }

    pub fn background(&self) -> &[ElementHandle] {
        &self.background
    }

    /// Region under a canvas-local point.
    pub fn pick(&self, x: f64, y: f64) -> Option<&RegionKey> {
        self.index.locate(x, y)
    }
}
