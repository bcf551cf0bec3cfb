use std::path::Path;

use anyhow::anyhow;

use crate::{
    geofile::gdal_geofile::{read_features_from_geofile, write_features_to_geofile},
    geometry::{engine::GeoEngine, within::filter_within},
};

use super::{should_run, RunOptions, RunOutcome};

/// Write the features of `infile` that lie within the first feature of `container_file` to `outfile`, with the
/// input's schema, CRS and driver.
pub fn filter_within_file(
    infile: &Path,
    container_file: &Path,
    outfile: &Path,
    options: &RunOptions,
) -> anyhow::Result<RunOutcome> {
    if !should_run(infile, outfile, options)? {
        return Ok(RunOutcome::Skipped);
    }
    if !container_file.exists() {
        return Err(anyhow!("Container file {:?} not found", container_file));
    }
    let containers = read_features_from_geofile(container_file)?;
    let container = containers
        .features
        .first()
        .ok_or_else(|| anyhow!("Container file {:?} has no features", container_file))?;
    if containers.len() > 1 {
        log::warn!(
            "Container file has {} features, only the first one is used",
            containers.len()
        );
    }

    let collection = read_features_from_geofile(infile)?;
    let inside = filter_within(&GeoEngine, &collection.features, &container.geometry)?;
    let output = collection.with_features(inside);
    let count = output.len();
    if output.is_empty() {
        log::warn!("No feature lies within the container, writing an empty layer");
    } else {
        log::info!("{} of {} features lie within the container", count, collection.len());
    }

    write_features_to_geofile(&output, outfile, options.show_progress)?;
    Ok(RunOutcome::Written { count })
}
