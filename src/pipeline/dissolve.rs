use std::{collections::HashMap, path::Path};

use gdal::vector::{OGRFieldType, OGRwkbGeometryType};

use crate::{
    geofile::{
        feature::{AttributeValue, Feature, FeatureCollection, FieldDefinition},
        gdal_geofile::{read_features_from_geofile, write_features_to_geofile},
    },
    geometry::{dissolve::dissolve, engine::GeoEngine},
};

use super::{should_run, RunOptions, RunOutcome};

/// Dissolve the polygons of `infile` into merged regions and write them to `outfile` with schema `{id: integer}`,
/// keeping the input's CRS and driver.
pub fn dissolve_file(
    infile: &Path,
    outfile: &Path,
    options: &RunOptions,
) -> anyhow::Result<RunOutcome> {
    if !should_run(infile, outfile, options)? {
        return Ok(RunOutcome::Skipped);
    }
    let collection = read_features_from_geofile(infile)?;

    let dissolved = dissolve(
        &GeoEngine,
        &collection.geometries(),
        &options.progress_bar(),
    )?;
    let count = dissolved.len();
    log::info!(
        "Dissolved {} polygons into {} regions",
        collection.len(),
        count
    );

    let features: Vec<Feature> = dissolved
        .into_iter()
        .map(|region| {
            Feature::with_attributes(
                geo::Geometry::Polygon(region.geometry),
                HashMap::from([("id".to_string(), AttributeValue::Integer(region.id))]),
            )
        })
        .collect();
    let output = FeatureCollection {
        features,
        schema: vec![FieldDefinition::new("id", OGRFieldType::OFTInteger)],
        geometry_type: OGRwkbGeometryType::wkbPolygon,
        crs: collection.crs,
        driver: collection.driver,
    };
    write_features_to_geofile(&output, outfile, options.show_progress)?;
    Ok(RunOutcome::Written { count })
}
