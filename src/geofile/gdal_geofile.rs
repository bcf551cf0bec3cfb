use anyhow::{anyhow, Context};
use gdal::vector::{FieldValue, LayerAccess};
use indicatif::ProgressBar;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::feature::{AttributeValue, Feature, FeatureCollection, FeatureMap, FieldDefinition};

/// GDAL short name of the Shapefile driver, the format GLIMS and RGI outlines ship in.
pub const SHAPEFILE_DRIVER: &str = "ESRI Shapefile";

/// DBF truncates longer field names.
const SHAPEFILE_MAX_FIELD_NAME_LEN: usize = 10;

/// Read the single layer of a vector file, keeping its schema, geometry type, CRS and driver so the features can be
/// written back in the same form.
pub fn read_features_from_geofile(filepath: &Path) -> anyhow::Result<FeatureCollection> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options)
        .with_context(|| format!("Opening {:?}", filepath))?;

    let layer_count = dataset.layer_count();
    if 0 == layer_count || 1 < layer_count {
        return Err(anyhow!(
            "Found {} layers, only one layer is supported.",
            layer_count
        ));
    }
    let driver = dataset.driver().short_name();
    let mut layer = dataset.layer(0)?;

    let schema: Vec<FieldDefinition> = layer
        .defn()
        .fields()
        .map(|field| FieldDefinition {
            name: field.name(),
            field_type: field.field_type(),
        })
        .collect();

    let (geometry_type, crs) = unsafe {
        let geometry_type = gdal_sys::OGR_L_GetGeomType(layer.c_layer());
        // The layer owns its spatial reference, from_c_obj clones it.
        let c_spatial_ref = gdal_sys::OGR_L_GetSpatialRef(layer.c_layer());
        let crs = if c_spatial_ref.is_null() {
            None
        } else {
            Some(gdal::spatial_ref::SpatialRef::from_c_obj(c_spatial_ref)?)
        };
        (geometry_type, crs)
    };
    match &crs {
        Some(crs) => log::debug!("Layer spatial ref is {}", crs.name()?),
        None => log::warn!("{:?} has no spatial reference", filepath),
    }

    let mut features = Vec::new();
    for (index, gdal_feature) in layer.features().enumerate() {
        let gdal_geometry = gdal_feature
            .geometry_by_index(0)
            .with_context(|| format!("Reading geometry of feature {}", index))?;
        let wkb_bytes = gdal_geometry.wkb()?;
        let geometry = wkb::wkb_to_geom(&mut wkb_bytes.as_slice()).map_err(|err| {
            anyhow!("Could not read WKB geometry of feature {}, {:?}", index, err)
        })?;
        let attributes: FeatureMap = gdal_feature
            .fields()
            .map(|(name, value)| {
                let value = attribute_value(&name, value);
                (name, value)
            })
            .collect();
        features.push(Feature::with_attributes(geometry, attributes));
    }
    log::info!("Read {} features from {:?}", features.len(), filepath);

    Ok(FeatureCollection {
        features,
        schema,
        geometry_type,
        crs,
        driver,
    })
}

fn attribute_value(field_name: &str, value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::IntegerValue(value)) => AttributeValue::Integer(value as i64),
        Some(FieldValue::Integer64Value(value)) => AttributeValue::Integer(value),
        Some(FieldValue::RealValue(value)) => AttributeValue::Real(value),
        Some(FieldValue::StringValue(value)) => AttributeValue::String(value),
        Some(FieldValue::DateValue(value)) => {
            AttributeValue::Date(value.format("%Y-%m-%d").to_string())
        }
        Some(FieldValue::DateTimeValue(value)) => AttributeValue::Date(value.to_rfc3339()),
        Some(_) => {
            log::warn!("Dropping list value of field {}", field_name);
            AttributeValue::Null
        }
    }
}

fn field_value(value: &AttributeValue) -> Option<FieldValue> {
    match value {
        AttributeValue::Integer(value) => Some(FieldValue::Integer64Value(*value)),
        AttributeValue::Real(value) => Some(FieldValue::RealValue(*value)),
        // OGR parses date strings when setting date fields.
        AttributeValue::String(value) | AttributeValue::Date(value) => {
            Some(FieldValue::StringValue(value.to_owned()))
        }
        AttributeValue::Null => None,
    }
}

/// Write a feature collection with its driver, CRS, geometry type and schema.
///
/// The dataset is created in a staging directory next to `output_filepath` and its files are moved into place
/// once GDAL has closed it. If anything fails, the staging directory is removed and an existing output is left as
/// it was.
pub fn write_features_to_geofile(
    collection: &FeatureCollection,
    output_filepath: &Path,
    show_progress: bool,
) -> anyhow::Result<()> {
    let file_name = output_filepath
        .file_name()
        .ok_or_else(|| anyhow!("Output path {:?} has no file name", output_filepath))?;
    let output_dir = match output_filepath.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let staging_dir = output_dir.join(format!(".{}.partial", file_name.to_string_lossy()));
    let backup_dir = output_dir.join(format!(".{}.previous", file_name.to_string_lossy()));
    if staging_dir.exists() {
        fs::remove_dir_all(&staging_dir)
            .with_context(|| format!("Removing stale staging directory {:?}", staging_dir))?;
    }
    fs::create_dir_all(&staging_dir)
        .with_context(|| format!("Creating staging directory {:?}", staging_dir))?;

    let result = write_dataset(collection, &staging_dir.join(file_name), show_progress)
        .and_then(|()| move_staged_files(&staging_dir, &output_dir, &backup_dir));
    if let Err(err) = result {
        if let Err(cleanup_err) = fs::remove_dir_all(&staging_dir) {
            log::warn!(
                "Could not remove staging directory {:?}: {}",
                staging_dir,
                cleanup_err
            );
        }
        return Err(err);
    }
    fs::remove_dir(&staging_dir)?;
    Ok(())
}

fn write_dataset(
    collection: &FeatureCollection,
    filepath: &Path,
    show_progress: bool,
) -> anyhow::Result<()> {
    gdal::DriverManager::register_all();
    let driver = gdal::DriverManager::get_driver_by_name(&collection.driver)
        .with_context(|| format!("Getting GDAL driver {}", collection.driver))?;

    let mut dataset = driver.create_vector_only(filepath)?;
    let layer_name = filepath
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let layer_options = gdal::LayerOptions {
        name: &layer_name,
        srs: collection.crs.as_ref(),
        ty: collection.geometry_type,
        options: None,
    };
    let mut layer = dataset.create_layer(layer_options)?;

    let field_definitions: Vec<(&str, gdal::vector::OGRFieldType::Type)> = collection
        .schema
        .iter()
        .map(|field| (field.name.as_str(), field.field_type))
        .collect();
    layer.create_defn_fields(&field_definitions)?;
    if collection.driver == SHAPEFILE_DRIVER {
        for field in &collection.schema {
            if field.name.len() > SHAPEFILE_MAX_FIELD_NAME_LEN {
                log::warn!(
                    "Field name {} is longer than {} characters and is truncated in a shapefile",
                    field.name,
                    SHAPEFILE_MAX_FIELD_NAME_LEN
                );
            }
        }
    }

    log::info!(
        "Writing {} features to {:?}",
        collection.len(),
        filepath.file_name().unwrap_or_default()
    );
    unsafe {
        // Start a transaction in case the driver supports transactions, e.g. GeoPackage.
        // Committing all features once as opposed to per-feature is a massive speedup for these drivers.
        gdal_sys::OGR_L_StartTransaction(layer.c_layer());
    };
    let bar = if show_progress {
        ProgressBar::new(collection.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    for (index, feature) in collection.features.iter().enumerate() {
        let wkb = wkb::geom_to_wkb(&feature.geometry).map_err(|err| {
            anyhow!("Could not write geometry of feature {} to WKB, {:?}", index, err)
        })?;
        let geometry = gdal::vector::Geometry::from_wkb(&wkb)?;

        match &feature.attributes {
            Some(attributes) => {
                // Only fields of the schema are written, in schema order.
                let (field_names, values): (Vec<&str>, Vec<FieldValue>) = collection
                    .schema
                    .iter()
                    .filter_map(|field| {
                        attributes
                            .get(&field.name)
                            .and_then(field_value)
                            .map(|value| (field.name.as_str(), value))
                    })
                    .unzip();
                layer.create_feature_fields(geometry, &field_names, &values)?;
            }
            None => layer.create_feature(geometry)?,
        }

        bar.inc(1);
    }
    unsafe {
        gdal_sys::OGR_L_CommitTransaction(layer.c_layer());
    };
    bar.finish_and_clear();
    Ok(())
}

/// Move every file of the staging directory into `output_dir`.
///
/// A dataset spans several files (`.shp`, `.shx`, `.dbf`, ...), so existing files of the same names are set aside
/// in `backup_dir` first. If any move fails, the moved files go back to staging and the set aside files are
/// restored.
fn move_staged_files(
    staging_dir: &Path,
    output_dir: &Path,
    backup_dir: &Path,
) -> anyhow::Result<()> {
    let mut moves = Vec::new();
    for entry in fs::read_dir(staging_dir)? {
        let entry = entry?;
        moves.push((entry.path(), output_dir.join(entry.file_name())));
    }
    moves.sort();
    install_files(&moves, backup_dir)
}

/// Rename each `(staged, destination)` pair, all or nothing.
fn install_files(moves: &[(PathBuf, PathBuf)], backup_dir: &Path) -> anyhow::Result<()> {
    if backup_dir.exists() {
        fs::remove_dir_all(backup_dir)
            .with_context(|| format!("Removing stale backup directory {:?}", backup_dir))?;
    }
    fs::create_dir_all(backup_dir)
        .with_context(|| format!("Creating backup directory {:?}", backup_dir))?;

    let mut backups = Vec::new();
    let mut installed = Vec::new();
    let result = try_install_files(moves, backup_dir, &mut backups, &mut installed);
    if result.is_err() {
        for (staged, destination) in installed.iter().rev() {
            if let Err(err) = fs::rename(destination, staged) {
                log::warn!("Could not move {:?} back to staging: {}", destination, err);
            }
        }
        for (backup, destination) in backups.iter().rev() {
            if let Err(err) = fs::rename(backup, destination) {
                log::warn!("Could not restore {:?}: {}", destination, err);
            }
        }
    }
    if let Err(err) = fs::remove_dir_all(backup_dir) {
        log::warn!("Could not remove backup directory {:?}: {}", backup_dir, err);
    }
    result
}

fn try_install_files(
    moves: &[(PathBuf, PathBuf)],
    backup_dir: &Path,
    backups: &mut Vec<(PathBuf, PathBuf)>,
    installed: &mut Vec<(PathBuf, PathBuf)>,
) -> anyhow::Result<()> {
    for (_, destination) in moves {
        if !destination.exists() {
            continue;
        }
        let file_name = destination
            .file_name()
            .ok_or_else(|| anyhow!("Destination {:?} has no file name", destination))?;
        let backup = backup_dir.join(file_name);
        fs::rename(destination, &backup)
            .with_context(|| format!("Setting aside existing {:?}", destination))?;
        backups.push((backup, destination.clone()));
    }
    for (staged, destination) in moves {
        fs::rename(staged, destination)
            .with_context(|| format!("Moving {:?} into place", destination))?;
        installed.push((staged.clone(), destination.clone()));
    }
    Ok(())
}
