use rayon::prelude::*;

use crate::geofile::feature::Feature;

use super::{engine::GeometryEngine, error::GeometryError};

/// Share of a candidate's area that may fall outside the container and still count as within.
const WITHIN_TOLERANCE: f64 = 1e-9;

/// For every candidate, whether it lies within `container`.
///
/// Candidates and container are repaired first. A candidate is within when the part of it not covered by the
/// container has no area, up to `WITHIN_TOLERANCE` of its own area.
pub fn within_mask<E: GeometryEngine>(
    engine: &E,
    candidates: &[geo::Geometry],
    container: &geo::Geometry,
) -> Result<Vec<bool>, GeometryError> {
    let container = engine
        .repair(container)
        .map_err(|source| GeometryError::ContainerRepair { source })?;

    candidates
        .par_iter()
        .enumerate()
        .map(|(index, candidate)| -> Result<bool, GeometryError> {
            let candidate = engine
                .repair(candidate)
                .map_err(|source| GeometryError::Repair { index, source })?;
            let area = engine.area(&candidate);
            if !area.is_finite() {
                return Err(GeometryError::NonFiniteArea { index });
            }
            if area <= 0.0 {
                return Err(GeometryError::ZeroArea { index });
            }
            Ok(engine.difference_area(&candidate, &container) <= WITHIN_TOLERANCE * area)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// The features lying within `container`, in input order, unchanged.
pub fn filter_within<E: GeometryEngine>(
    engine: &E,
    features: &[Feature],
    container: &geo::Geometry,
) -> Result<Vec<Feature>, GeometryError> {
    let geometries: Vec<geo::Geometry> = features
        .iter()
        .map(|feature| feature.geometry.clone())
        .collect();
    let mask = within_mask(engine, &geometries, container)?;
    Ok(features
        .iter()
        .zip(mask)
        .filter(|(_, is_within)| *is_within)
        .map(|(feature, _)| feature.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{filter_within, within_mask};
    use crate::geofile::feature::Feature;
    use crate::geometry::{
        engine::{tests::square, GeoEngine},
        error::GeometryError,
    };

    fn polygon(x: f64, y: f64, size: f64) -> geo::Geometry {
        geo::Geometry::Polygon(square(x, y, size))
    }

    #[test]
    fn test_within_mask() {
        let container = polygon(0.0, 0.0, 10.0);
        let candidates = vec![
            polygon(1.0, 1.0, 2.0),
            polygon(9.0, 9.0, 2.0),
            polygon(20.0, 20.0, 1.0),
            // Shares the container's lower left corner and edges.
            polygon(0.0, 0.0, 1.0),
        ];
        let mask = within_mask(&GeoEngine, &candidates, &container).unwrap();
        assert_eq!(mask, [true, false, false, true]);
    }

    #[test]
    fn test_filter_within_keeps_input_order_and_geometry() {
        let container = polygon(0.0, 0.0, 10.0);
        let features: Vec<Feature> = vec![
            Feature::from(polygon(5.0, 5.0, 1.0)),
            Feature::from(polygon(-5.0, -5.0, 1.0)),
            Feature::from(polygon(2.0, 2.0, 1.0)),
        ];
        let inside = filter_within(&GeoEngine, &features, &container).unwrap();
        assert_eq!(inside, [features[0].clone(), features[2].clone()]);
    }

    #[test]
    fn test_non_areal_container_is_an_error() {
        let container = geo::Geometry::Point(geo::Point::new(0.0, 0.0));
        let err = within_mask(&GeoEngine, &[polygon(0.0, 0.0, 1.0)], &container).unwrap_err();
        assert!(matches!(err, GeometryError::ContainerRepair { .. }));
    }
}
