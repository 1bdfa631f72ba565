use super::{CanvasId, Drawable, Paint, SceneRenderer};
use crate::classify::Color;
use anyhow::{anyhow, Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{Coord, MultiPolygon, Point, Rect};
use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;
use std::path::Path;

const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

struct FilledShape {
    geometry: MultiPolygon<f64>,
    bbox: Rect<f64>,
    color: Rgba<u8>,
}

fn to_rgba(color: Color) -> Rgba<u8> {
    let [r, g, b] = color.rgb;
    Rgba([r, g, b, 255])
}

/// Fills every shape on `canvas` with its current fill, sampling pixel
/// centers. Strokes and text are not rasterized.
pub fn rasterize(scene: &SceneRenderer, canvas: CanvasId) -> Option<RgbaImage> {
    let c = scene.canvas(canvas)?;
    let width = c.width.ceil().max(1.0) as u32;
    let height = c.height.ceil().max(1.0) as u32;

    let shapes: Vec<FilledShape> = scene
        .elements_on(canvas)
        .filter_map(|(_, e)| {
            let Some(Paint::Color(fill)) = e.style.fill else {
                return None;
            };
            let geometry = match &e.drawable {
                Drawable::Path(g) => g.clone(),
                Drawable::Rect(initial) => {
                    let r = e.style.rect.unwrap_or(*initial);
                    let rect = Rect::new(
                        Coord { x: r.x, y: r.y },
                        Coord {
                            x: r.x + r.width,
                            y: r.y + r.height,
                        },
                    );
                    MultiPolygon::new(vec![rect.to_polygon()])
                }
                Drawable::Text { .. } => return None,
            };
            let bbox = geometry.bounding_rect()?;
            Some(FilledShape {
                geometry,
                bbox,
                color: to_rgba(fill),
            })
        })
        .collect();

    let rows: Vec<Vec<Rgba<u8>>> = (0..height)
        .into_par_iter()
        .map(|py| {
            let y = py as f64 + 0.5;
            (0..width)
                .map(|px| {
                    let x = px as f64 + 0.5;
                    let pt = Point::new(x, y);
                    // Topmost (last drawn) shape wins.
                    shapes
                        .iter()
                        .rev()
                        .find(|s| {
                            x >= s.bbox.min().x
                                && x <= s.bbox.max().x
                                && y >= s.bbox.min().y
                                && y <= s.bbox.max().y
                                && s.geometry.contains(&pt)
                        })
                        .map_or(CLEAR, |s| s.color)
                })
                .collect()
        })
        .collect();

    let mut img: RgbaImage = ImageBuffer::new(width, height);
    for (py, row) in rows.into_iter().enumerate() {
        for (px, color) in row.into_iter().enumerate() {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
    Some(img)
}

pub fn save_png(scene: &SceneRenderer, canvas: CanvasId, path: &Path) -> Result<()> {
    let img = rasterize(scene, canvas).ok_or_else(|| anyhow!("Unknown canvas {:?}", canvas))?;
    img.save(path)
        .with_context(|| format!("Failed to save image: {:?}", path))?;
    Ok(())
}
