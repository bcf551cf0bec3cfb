use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::geofile::feature::Feature;

use super::{
    engine::{to_feature_geometry, GeometryEngine},
    error::GeometryError,
};

/// Parameters of the overlap search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapParams {
    /// A pair overlaps when its overlap fraction is strictly greater than this, in [0, 1].
    pub threshold: f64,
    /// Combine the two per-polygon fractions with `min` instead of `max`.
    pub use_min: bool,
    /// Keep both members of an overlapping pair instead of only the first.
    pub keep_both: bool,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            use_min: false,
            keep_both: false,
        }
    }
}

/// A repaired geometry with its area, remembering its position in the input.
pub struct PreparedGeometry {
    pub index: usize,
    pub geometry: geo::MultiPolygon,
    pub area: f64,
}

impl PreparedGeometry {
    pub fn new<E: GeometryEngine>(
        engine: &E,
        index: usize,
        geometry: &geo::Geometry,
    ) -> Result<Self, GeometryError> {
        let geometry = engine
            .repair(geometry)
            .map_err(|source| GeometryError::Repair { index, source })?;
        let area = engine.area(&geometry);
        Ok(Self {
            index,
            geometry,
            area,
        })
    }

    fn checked_area(&self) -> Result<f64, GeometryError> {
        if !self.area.is_finite() {
            return Err(GeometryError::NonFiniteArea { index: self.index });
        }
        if self.area <= 0.0 {
            return Err(GeometryError::ZeroArea { index: self.index });
        }
        Ok(self.area)
    }
}

/// Fraction of `a` and `b` covered by their intersection, combined with `min` or `max`.
///
/// Errors if either geometry has no area, since the fraction would be undefined.
pub fn overlap_fraction<E: GeometryEngine>(
    engine: &E,
    a: &PreparedGeometry,
    b: &PreparedGeometry,
    use_min: bool,
) -> Result<f64, GeometryError> {
    let a_area = a.checked_area()?;
    let b_area = b.checked_area()?;
    let inter_area = engine.intersection_area(&a.geometry, &b.geometry);
    let frac_a = inter_area / a_area;
    let frac_b = inter_area / b_area;
    Ok(if use_min {
        frac_a.min(frac_b)
    } else {
        frac_a.max(frac_b)
    })
}

/// Find the features that overlap at least one other feature by more than `params.threshold`.
///
/// Pairs `(i, j)` with `i < j` are visited with `i` varying slowest. For every overlapping pair the first feature,
/// and with `keep_both` also the second, is appended unless an equal feature is already in the result. Returned
/// features carry the repaired geometry used for the comparison.
///
/// The pair fractions are computed in parallel, one row `i` per task; the result is assembled sequentially in pair
/// order afterwards.
pub fn detect_overlaps<E: GeometryEngine>(
    engine: &E,
    features: &[Feature],
    params: &OverlapParams,
    progress: &ProgressBar,
) -> Result<Vec<Feature>, GeometryError> {
    let prepared: Vec<PreparedGeometry> = first_error_in_order(
        features
            .par_iter()
            .enumerate()
            .map(|(index, feature)| PreparedGeometry::new(engine, index, &feature.geometry))
            .collect(),
    )?;

    let num_features = prepared.len();
    progress.set_length((num_features * num_features.saturating_sub(1) / 2) as u64);
    // Overlapping partners j > i for every row i.
    let partners: Vec<Vec<usize>> = first_error_in_order(
        (0..num_features)
            .into_par_iter()
            .map(|i| -> Result<Vec<usize>, GeometryError> {
                let mut row_partners = Vec::new();
                for j in (i + 1)..num_features {
                    let fraction =
                        overlap_fraction(engine, &prepared[i], &prepared[j], params.use_min)?;
                    if fraction > params.threshold {
                        row_partners.push(j);
                    }
                }
                progress.inc((num_features - i - 1) as u64);
                Ok(row_partners)
            })
            .collect(),
    )?;
    progress.finish_and_clear();

    // Feature indices in the order the pair scan appends them.
    let mut scan_order: Vec<usize> = Vec::new();
    for (i, row_partners) in partners.iter().enumerate() {
        for &j in row_partners {
            scan_order.push(i);
            if params.keep_both {
                scan_order.push(j);
            }
        }
    }

    let mut repaired: Vec<Option<geo::MultiPolygon>> = prepared
        .into_iter()
        .map(|prepared| Some(prepared.geometry))
        .collect();
    let mut overlapping: Vec<Feature> = Vec::new();
    for index in scan_order {
        // Taken on first visit, later visits of the same index are already represented.
        let Some(geometry) = repaired[index].take() else {
            continue;
        };
        let feature = Feature {
            geometry: to_feature_geometry(geometry),
            attributes: features[index].attributes.clone(),
        };
        if !overlapping.contains(&feature) {
            overlapping.push(feature);
        }
    }
    Ok(overlapping)
}

/// Collect per-item results, reporting the error of the lowest index if any failed.
fn first_error_in_order<T>(results: Vec<Result<T, GeometryError>>) -> Result<Vec<T>, GeometryError> {
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use approx::assert_abs_diff_eq;
    use geo::Area;
    use indicatif::ProgressBar;
    use rstest::rstest;

    use super::{detect_overlaps, overlap_fraction, OverlapParams, PreparedGeometry};
    use crate::geofile::feature::{AttributeValue, Feature};
    use crate::geometry::{
        engine::{
            tests::{bowtie, square},
            to_feature_geometry, GeoEngine, GeometryEngine,
        },
        error::GeometryError,
    };

    fn glacier(id: &str, x: f64, y: f64, size: f64) -> Feature {
        Feature::with_attributes(
            geo::Geometry::Polygon(square(x, y, size)),
            HashMap::from([(
                "glac_id".to_string(),
                AttributeValue::String(id.to_string()),
            )]),
        )
    }

    fn ids(features: &[Feature]) -> Vec<String> {
        features
            .iter()
            .map(|feature| match feature.attribute("glac_id") {
                Some(AttributeValue::String(id)) => id.clone(),
                other => panic!("Unexpected id {:?}", other),
            })
            .collect()
    }

    fn run(features: &[Feature], threshold: f64, use_min: bool, keep_both: bool) -> Vec<Feature> {
        detect_overlaps(
            &GeoEngine,
            features,
            &OverlapParams {
                threshold,
                use_min,
                keep_both,
            },
            &ProgressBar::hidden(),
        )
        .unwrap()
    }

    fn prepared(index: usize, feature: &Feature) -> PreparedGeometry {
        PreparedGeometry::new(&GeoEngine, index, &feature.geometry).unwrap()
    }

    #[rstest]
    #[case(true, vec!["a", "b"])]
    #[case(false, vec!["a"])]
    fn test_two_overlapping_squares(#[case] keep_both: bool, #[case] expected: Vec<&str>) {
        let features = vec![glacier("a", 0.0, 0.0, 1.0), glacier("b", 0.5, 0.5, 1.0)];
        let overlapping = run(&features, 0.1, false, keep_both);
        assert_eq!(ids(&overlapping), expected);
    }

    #[test]
    fn test_disjoint_squares_do_not_overlap() {
        let features = vec![glacier("a", 0.0, 0.0, 1.0), glacier("b", 5.0, 5.0, 1.0)];
        for threshold in [0.0, 0.1, 0.5, 1.0] {
            assert!(run(&features, threshold, false, true).is_empty());
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        // Overlap fraction is exactly 0.25.
        let features = vec![glacier("a", 0.0, 0.0, 1.0), glacier("b", 0.5, 0.5, 1.0)];
        assert!(run(&features, 0.25, false, true).is_empty());
        assert_eq!(run(&features, 0.2499, false, true).len(), 2);
    }

    #[test]
    fn test_use_min_selects_smaller_fraction() {
        // The small square lies entirely inside the big one: fractions 1.0 and 0.0625.
        let features = vec![glacier("big", 0.0, 0.0, 4.0), glacier("small", 1.0, 1.0, 1.0)];
        let a = prepared(0, &features[0]);
        let b = prepared(1, &features[1]);
        assert_abs_diff_eq!(
            overlap_fraction(&GeoEngine, &a, &b, false).unwrap(),
            1.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            overlap_fraction(&GeoEngine, &a, &b, true).unwrap(),
            0.0625,
            epsilon = 1e-9
        );
        assert_eq!(ids(&run(&features, 0.5, false, false)), ["big"]);
        assert!(run(&features, 0.5, true, false).is_empty());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_overlap_fraction_is_symmetric(#[case] use_min: bool) {
        let a = prepared(0, &glacier("a", 0.0, 0.0, 2.0));
        let b = prepared(1, &glacier("b", 1.5, 0.5, 1.0));
        assert_abs_diff_eq!(
            overlap_fraction(&GeoEngine, &a, &b, use_min).unwrap(),
            overlap_fraction(&GeoEngine, &b, &a, use_min).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_area_is_an_error() {
        let a = prepared(0, &glacier("a", 0.0, 0.0, 1.0));
        let empty = PreparedGeometry {
            index: 1,
            geometry: geo::MultiPolygon::new(vec![]),
            area: 0.0,
        };
        assert_eq!(
            overlap_fraction(&GeoEngine, &a, &empty, false).unwrap_err(),
            GeometryError::ZeroArea { index: 1 }
        );
        assert_eq!(
            overlap_fraction(&GeoEngine, &empty, &a, true).unwrap_err(),
            GeometryError::ZeroArea { index: 1 }
        );
    }

    #[rstest]
    #[case(f64::INFINITY)]
    #[case(f64::NAN)]
    fn test_non_finite_area_is_an_error(#[case] area: f64) {
        let a = prepared(0, &glacier("a", 0.0, 0.0, 1.0));
        let unbounded = PreparedGeometry {
            index: 1,
            geometry: geo::MultiPolygon::new(vec![square(0.0, 0.0, 1.0)]),
            area,
        };
        assert_eq!(
            overlap_fraction(&GeoEngine, &a, &unbounded, false).unwrap_err(),
            GeometryError::NonFiniteArea { index: 1 }
        );
    }

    #[test]
    fn test_zero_area_feature_fails_the_scan() {
        let features = vec![
            glacier("a", 0.0, 0.0, 1.0),
            Feature::from(geo::Geometry::MultiPolygon(geo::MultiPolygon::new(vec![]))),
        ];
        let err = detect_overlaps(
            &GeoEngine,
            &features,
            &OverlapParams::default(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert_eq!(err, GeometryError::ZeroArea { index: 1 });
    }

    #[test]
    fn test_non_areal_feature_reports_its_index() {
        let features = vec![
            glacier("a", 0.0, 0.0, 1.0),
            glacier("b", 0.5, 0.5, 1.0),
            Feature::from(geo::Geometry::Point(geo::Point::new(0.5, 0.5))),
        ];
        let err = detect_overlaps(
            &GeoEngine,
            &features,
            &OverlapParams::default(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, GeometryError::Repair { index: 2, .. }));
    }

    #[test]
    fn test_result_is_in_pair_scan_order() {
        // Pairs in scan order: (0,1) no, (0,2) no, (0,3) no, (1,2) no, (1,3) yes, (2,3) yes.
        let features = vec![
            glacier("far", 50.0, 50.0, 1.0),
            glacier("b", 0.0, 0.0, 1.0),
            glacier("c", 2.0, 0.0, 1.0),
            glacier("d", 0.5, 0.0, 2.0),
        ];
        assert_eq!(ids(&run(&features, 0.1, false, true)), ["b", "d", "c"]);
        assert_eq!(ids(&run(&features, 0.1, false, false)), ["b", "c"]);
    }

    #[test]
    fn test_equal_features_are_returned_once() {
        let features = vec![
            glacier("dup", 0.0, 0.0, 1.0),
            glacier("dup", 0.0, 0.0, 1.0),
            glacier("other", 0.5, 0.0, 1.0),
        ];
        let overlapping = run(&features, 0.1, false, true);
        assert_eq!(ids(&overlapping), ["dup", "other"]);
    }

    #[test]
    fn test_result_properties() {
        let features = vec![
            glacier("a", 0.0, 0.0, 1.0),
            glacier("b", 0.8, 0.0, 1.0),
            glacier("c", 0.5, 0.5, 1.0),
            glacier("d", 10.0, 10.0, 1.0),
            glacier("e", 10.4, 10.0, 1.0),
        ];
        let mut previous_len = usize::MAX;
        for threshold in [0.0, 0.1, 0.2, 0.3, 0.5, 0.7, 1.0] {
            let both = run(&features, threshold, false, true);
            let first_only = run(&features, threshold, false, false);
            assert!(both.len() <= features.len());
            assert!(first_only.iter().all(|feature| both.contains(feature)));
            assert!(both.len() <= previous_len);
            previous_len = both.len();
        }
    }

    #[test]
    fn test_output_keeps_attributes_and_area() {
        let features = vec![glacier("a", 0.0, 0.0, 1.0), glacier("b", 0.5, 0.5, 1.0)];
        let overlapping = run(&features, 0.1, false, true);
        for (output, input) in overlapping.iter().zip(features.iter()) {
            assert_eq!(output.attributes, input.attributes);
            assert_abs_diff_eq!(output.geometry.unsigned_area(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_self_intersecting_feature_is_returned_repaired() {
        // The square covers the right lobe of the bowtie: fractions 0.5 and 0.25.
        let raw = geo::Geometry::Polygon(bowtie());
        let attributes = HashMap::from([(
            "glac_id".to_string(),
            AttributeValue::String("bowtie".to_string()),
        )]);
        let features = vec![
            Feature::with_attributes(raw.clone(), attributes.clone()),
            glacier("square", 0.5, 0.0, 1.0),
        ];
        let overlapping = run(&features, 0.1, false, false);
        assert_eq!(ids(&overlapping), ["bowtie"]);

        let expected = to_feature_geometry(GeoEngine.repair(&raw).unwrap());
        assert_eq!(overlapping[0].geometry, expected);
        assert_ne!(overlapping[0].geometry, raw);
        assert_eq!(overlapping[0].attributes, Some(attributes));
        assert_abs_diff_eq!(overlapping[0].geometry.unsigned_area(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_fewer_than_two_features() {
        assert!(run(&[], 0.1, false, true).is_empty());
        assert!(run(&[glacier("a", 0.0, 0.0, 1.0)], 0.1, false, true).is_empty());
    }
}
