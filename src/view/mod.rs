pub mod chart;
pub mod map;

use crate::render::{ElementHandle, StrokeStyle};
use crate::types::RegionKey;
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

pub use chart::ChartView;
pub use map::MapView;

/// What the coordinator needs to know about an interactive element.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub region: RegionKey,
    /// Stroke captured when the element was created.
    pub original: StrokeStyle,
}

/// Pointer subscriptions and captured styles for every interactive element,
/// keyed by element and grouped by region.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    by_handle: HashMap<ElementHandle, Subscription>,
    by_region: HashMap<RegionKey, Vec<ElementHandle>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: ElementHandle, region: RegionKey, original: StrokeStyle) {
        self.by_region
            .entry(region.clone())
            .or_default()
            .push(handle);
        self.by_handle.insert(handle, Subscription { region, original });
    }

    pub fn region_of(&self, handle: ElementHandle) -> Option<&RegionKey> {
        self.by_handle.get(&handle).map(|s| &s.region)
    }

    pub fn original_stroke(&self, handle: ElementHandle) -> Option<StrokeStyle> {
        self.by_handle.get(&handle).map(|s| s.original)
    }

    /// Every element tagged with `region`, in registration order.
    pub fn elements_for(&self, region: &RegionKey) -> &[ElementHandle] {
        self.by_region.get(region).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

struct IndexedShape {
    slot: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedShape {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Screen-space lookup from a pointer position to the region under it.
pub struct RegionIndex {
    shapes: Vec<(RegionKey, MultiPolygon<f64>)>,
    tree: RTree<IndexedShape>,
}

impl RegionIndex {
    pub fn build(shapes: Vec<(RegionKey, MultiPolygon<f64>)>) -> Self {
        let items: Vec<IndexedShape> = shapes
            .iter()
            .enumerate()
            .filter_map(|(slot, (_, geometry))| {
                let rect = geometry.bounding_rect()?;
                Some(IndexedShape {
                    slot,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            shapes,
            tree: RTree::bulk_load(items),
        }
    }

    /// Region whose shape contains `(x, y)`. Later shapes win on overlap.
    pub fn locate(&self, x: f64, y: f64) -> Option<&RegionKey> {
        let point = Point::new(x, y);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .filter(|candidate| self.shapes[candidate.slot].1.contains(&point))
            .max_by_key(|candidate| candidate.slot)
            .map(|candidate| &self.shapes[candidate.slot].0)
    }
}

impl std::fmt::Debug for RegionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionIndex")
            .field("shapes", &self.shapes.len())
            .finish()
    }
}
