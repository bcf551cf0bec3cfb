use std::path::Path;

use crate::{
    geofile::gdal_geofile::{read_features_from_geofile, write_features_to_geofile},
    geometry::{
        engine::GeoEngine,
        overlap::{detect_overlaps, OverlapParams},
    },
};

use super::{should_run, RunOptions, RunOutcome};

/// Write the features of `infile` that overlap another feature to `outfile`, with the input's schema, CRS and
/// driver.
pub fn find_overlaps_in_file(
    infile: &Path,
    outfile: &Path,
    params: &OverlapParams,
    options: &RunOptions,
) -> anyhow::Result<RunOutcome> {
    if !should_run(infile, outfile, options)? {
        return Ok(RunOutcome::Skipped);
    }
    let collection = read_features_from_geofile(infile)?;

    log::info!(
        "Searching {} pairs for overlaps above {}",
        collection.len() * collection.len().saturating_sub(1) / 2,
        params.threshold
    );
    let overlapping = detect_overlaps(
        &GeoEngine,
        &collection.features,
        params,
        &options.progress_bar(),
    )?;
    let output = collection.with_features(overlapping);
    if output.is_empty() {
        log::warn!("No overlapping features found, writing an empty layer");
    }

    write_features_to_geofile(&output, outfile, options.show_progress)?;
    let count = output.len();
    Ok(RunOutcome::Written { count })
}
