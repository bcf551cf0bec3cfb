use std::collections::HashMap;

/// Attribute value of a feature. GDAL list types are not carried.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    String(String),
    /// ISO 8601 date or datetime, as read from the source.
    Date(String),
    Null,
}

/// Attributes of a feature, keyed by field name.
pub type FeatureMap = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: geo::Geometry,
    pub attributes: Option<FeatureMap>,
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: value,
            attributes: None,
        }
    }
}

impl Feature {
    pub fn with_attributes(geometry: geo::Geometry, attributes: FeatureMap) -> Self {
        Self {
            geometry,
            attributes: Some(attributes),
        }
    }
}

#[cfg(test)]
impl Feature {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.as_ref().and_then(|attributes| attributes.get(name))
    }
}

/// One column of a layer schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: gdal::vector::OGRFieldType::Type,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: gdal::vector::OGRFieldType::Type) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}

/// Features of a single layer together with the metadata needed to write them back in the same form.
#[derive(Clone)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// Field definitions in layer order.
    pub schema: Vec<FieldDefinition>,
    pub geometry_type: gdal::vector::OGRwkbGeometryType::Type,
    pub crs: Option<gdal::spatial_ref::SpatialRef>,
    /// GDAL short driver name, e.g. "ESRI Shapefile".
    pub driver: String,
}

impl FeatureCollection {
    /// A collection with the same schema, CRS and driver as `self` holding other features.
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self {
            features,
            schema: self.schema.clone(),
            geometry_type: self.geometry_type,
            crs: self.crs.clone(),
            driver: self.driver.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn geometries(&self) -> Vec<geo::Geometry> {
        self.features
            .iter()
            .map(|feature| feature.geometry.clone())
            .collect()
    }
}
