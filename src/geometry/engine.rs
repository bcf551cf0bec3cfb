use geo::{Area, BooleanOps, BoundingRect, CoordsIter, Geometry, Intersects, MultiPolygon, Polygon};

use super::error::RepairError;

/// The geometry operations the overlap, dissolve and within algorithms rely on.
///
/// All areal geometries handled by the algorithms are `MultiPolygon`s: repairing a single self-intersecting
/// polygon may split it into several parts.
pub trait GeometryEngine: Sync {
    /// Zero-buffer repair: resolve self-intersections, leave valid geometries unchanged up to vertex order.
    fn repair(&self, geometry: &Geometry) -> Result<MultiPolygon, RepairError>;

    fn area(&self, geometry: &MultiPolygon) -> f64;

    /// Area of the intersection of `a` and `b`.
    fn intersection_area(&self, a: &MultiPolygon, b: &MultiPolygon) -> f64;

    /// Area of the part of `a` not covered by `b`.
    fn difference_area(&self, a: &MultiPolygon, b: &MultiPolygon) -> f64;

    /// Whether `a` and `b` share any point, boundary contact included.
    fn intersects(&self, a: &MultiPolygon, b: &MultiPolygon) -> bool;

    /// Topological union of all geometries. Disjoint inputs stay separate parts of the result.
    fn union(&self, geometries: &[MultiPolygon]) -> MultiPolygon;

    /// Split a union result into its disjoint polygons.
    fn components_of(&self, geometry: MultiPolygon) -> Vec<Polygon>;
}

/// `GeometryEngine` backed by the boolean operations of the `geo` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoEngine;

impl GeometryEngine for GeoEngine {
    fn repair(&self, geometry: &Geometry) -> Result<MultiPolygon, RepairError> {
        let parts = areal_parts(geometry)?;
        if !all_coords_finite(&parts) {
            return Err(RepairError::NonFinite);
        }
        let empty = MultiPolygon::new(Vec::new());
        // A union against nothing rebuilds every ring from the noded edges, splitting self-intersections.
        let repaired_parts: Vec<MultiPolygon> = parts
            .into_iter()
            .map(|part| MultiPolygon::new(vec![part]).union(&empty))
            .collect();
        let repaired = cascaded_union(&repaired_parts);
        if !all_coords_finite(&repaired.0) {
            return Err(RepairError::NonFinite);
        }
        Ok(repaired)
    }

    fn area(&self, geometry: &MultiPolygon) -> f64 {
        geometry.unsigned_area()
    }

    fn intersection_area(&self, a: &MultiPolygon, b: &MultiPolygon) -> f64 {
        if !bounding_rects_intersect(a, b) {
            return 0.0;
        }
        a.intersection(b).unsigned_area()
    }

    fn difference_area(&self, a: &MultiPolygon, b: &MultiPolygon) -> f64 {
        if !bounding_rects_intersect(a, b) {
            return a.unsigned_area();
        }
        a.difference(b).unsigned_area()
    }

    fn intersects(&self, a: &MultiPolygon, b: &MultiPolygon) -> bool {
        bounding_rects_intersect(a, b)
            && a.0
                .iter()
                .any(|a_part| b.0.iter().any(|b_part| a_part.intersects(b_part)))
    }

    fn union(&self, geometries: &[MultiPolygon]) -> MultiPolygon {
        cascaded_union(geometries)
    }

    fn components_of(&self, geometry: MultiPolygon) -> Vec<Polygon> {
        geometry.0
    }
}

/// Union by balanced pairwise merging. The merge tree only depends on the input length, so the result is the
/// same no matter how rayon schedules the halves.
fn cascaded_union(geometries: &[MultiPolygon]) -> MultiPolygon {
    match geometries {
        [] => MultiPolygon::new(Vec::new()),
        [single] => single.clone(),
        _ => {
            let (left, right) = geometries.split_at(geometries.len() / 2);
            let (left, right) = rayon::join(|| cascaded_union(left), || cascaded_union(right));
            left.union(&right)
        }
    }
}

fn areal_parts(geometry: &Geometry) -> Result<Vec<Polygon>, RepairError> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(vec![polygon.clone()]),
        Geometry::MultiPolygon(multi_polygon) => Ok(multi_polygon.0.clone()),
        Geometry::Rect(rect) => Ok(vec![rect.to_polygon()]),
        Geometry::Triangle(triangle) => Ok(vec![triangle.to_polygon()]),
        Geometry::GeometryCollection(collection) => {
            let mut parts = Vec::new();
            for member in collection.iter() {
                // Points and lines inside a collection carry no area, only the areal members count.
                if let Ok(member_parts) = areal_parts(member) {
                    parts.extend(member_parts);
                }
            }
            if parts.is_empty() {
                return Err(RepairError::NotAreal("GeometryCollection"));
            }
            Ok(parts)
        }
        other => Err(RepairError::NotAreal(geometry_kind(other))),
    }
}

pub fn geometry_kind(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn all_coords_finite(polygons: &[Polygon]) -> bool {
    polygons.iter().all(|polygon| {
        polygon
            .coords_iter()
            .all(|coord| coord.x.is_finite() && coord.y.is_finite())
    })
}

fn bounding_rects_intersect(a: &MultiPolygon, b: &MultiPolygon) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(a_rect), Some(b_rect)) => a_rect.intersects(&b_rect),
        _ => false,
    }
}

/// Convert a repaired geometry back into a feature geometry, unwrapping single-part results to a `Polygon`.
pub fn to_feature_geometry(mut geometry: MultiPolygon) -> Geometry {
    match geometry.0.len() {
        1 => Geometry::Polygon(geometry.0.remove(0)),
        _ => Geometry::MultiPolygon(geometry),
    }
}
