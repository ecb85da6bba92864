//! Polygon helpers used by the partitioner, compositor and label engine

use crate::config::ClipSide;
use crate::map::Bounds;
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, CoordsIter, InteriorPoint, MultiPolygon,
    Point, Polygon, Validation,
};
use glam::DVec2;

/// How an anchor point was obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorSource {
    /// Interior point strictly inside the geometry
    Interior,
    Centroid,
    BoundsCenter,
    FirstVertex,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub point: DVec2,
    pub source: AnchorSource,
}

fn to_vec(p: Point<f64>) -> DVec2 {
    DVec2::new(p.x(), p.y())
}

pub fn is_empty(geometry: &MultiPolygon<f64>) -> bool {
    geometry.coords_count() == 0
}

/// Return a valid version of `geometry`, or `None` if it cannot be repaired.
///
/// Invalid input is run through a union with the empty set, which rebuilds
/// the rings and resolves self-intersections the same way a zero-width buffer
/// would.
pub fn repair(geometry: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if is_empty(geometry) {
        return None;
    }
    if geometry.is_valid() && geometry.unsigned_area() > 0.0 {
        return Some(geometry.clone());
    }
    let rebuilt = geometry.union(&MultiPolygon::<f64>::new(vec![]));
    if is_empty(&rebuilt) || rebuilt.unsigned_area() <= 0.0 {
        return None;
    }
    Some(rebuilt)
}

/// Representative point of a geometry with a fallback chain:
/// interior point, centroid, bounding-box center, first vertex.
pub fn representative_point(geometry: &MultiPolygon<f64>) -> Option<Anchor> {
    if let Some(p) = geometry.interior_point() {
        if geometry.contains(&p) {
            return Some(Anchor {
                point: to_vec(p),
                source: AnchorSource::Interior,
            });
        }
    }
    if let Some(c) = geometry.centroid() {
        if c.x().is_finite() && c.y().is_finite() {
            return Some(Anchor {
                point: to_vec(c),
                source: AnchorSource::Centroid,
            });
        }
    }
    if let Some(rect) = geometry.bounding_rect() {
        let center = rect.center();
        return Some(Anchor {
            point: DVec2::new(center.x, center.y),
            source: AnchorSource::BoundsCenter,
        });
    }
    geometry.coords_iter().next().map(|c| Anchor {
        point: DVec2::new(c.x, c.y),
        source: AnchorSource::FirstVertex,
    })
}

/// Rectangle covering `fraction` of the geometry's bounding box on `side`
pub fn side_rect(bounds: &Bounds, side: ClipSide, fraction: f64) -> Bounds {
    let size = bounds.size();
    match side {
        ClipSide::Top => Bounds::new(
            DVec2::new(bounds.min.x, bounds.max.y - size.y * fraction),
            bounds.max,
        ),
        ClipSide::Bottom => Bounds::new(
            bounds.min,
            DVec2::new(bounds.max.x, bounds.min.y + size.y * fraction),
        ),
        ClipSide::Left => Bounds::new(
            bounds.min,
            DVec2::new(bounds.min.x + size.x * fraction, bounds.max.y),
        ),
        ClipSide::Right => Bounds::new(
            DVec2::new(bounds.max.x - size.x * fraction, bounds.min.y),
            bounds.max,
        ),
    }
}

/// Intersect a geometry with the `fraction` of its bounding box on `side`.
/// Returns `None` when the intersection is empty.
pub fn clip_to_side(geometry: &MultiPolygon<f64>, side: ClipSide, fraction: f64) -> Option<MultiPolygon<f64>> {
    let bounds = Bounds::from(geometry.bounding_rect()?);
    let clip = side_rect(&bounds, side, fraction);
    let clipped = geometry.intersection(&clip.to_rect().to_polygon());
    if is_empty(&clipped) {
        None
    } else {
        Some(clipped)
    }
}

/// Intersect a geometry with a display window
pub fn clip_to_bounds(geometry: &MultiPolygon<f64>, bounds: &Bounds) -> MultiPolygon<f64> {
    geometry.intersection(&bounds.to_rect().to_polygon())
}

/// Largest part of a (multi-part) geometry by area
pub fn largest_polygon(geometry: &MultiPolygon<f64>) -> Option<&Polygon<f64>> {
    geometry
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}
