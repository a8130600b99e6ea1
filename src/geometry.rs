// src/geometry.rs

use arrow::{
    array::{Array, ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use geo_types::{Geometry, GeometryCollection};
use glob::glob;
use shapefile::{
    dbase::{self, FieldValue},
    Shape,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};

/// Country boundaries with their attribute table, one record per shape.
#[derive(Debug, Clone)]
pub struct PolygonCollection {
    attributes: RecordBatch,
    geometries: Vec<Geometry<f64>>,
    key_attribute: String,
}

impl PolygonCollection {
    /// `key_attribute` must name a Utf8 column of `attributes`, and there
    /// must be one geometry per attribute row.
    pub fn new(
        attributes: RecordBatch,
        geometries: Vec<Geometry<f64>>,
        key_attribute: impl Into<String>,
    ) -> Result<Self> {
        let key_attribute = key_attribute.into();
        if attributes.num_rows() != geometries.len() {
            return Err(Error::Schema {
                table: "geometry".into(),
                reason: format!(
                    "{} attribute rows but {} geometries",
                    attributes.num_rows(),
                    geometries.len()
                ),
            });
        }
        let is_utf8_key = attributes
            .schema()
            .field_with_name(&key_attribute)
            .map(|f| f.data_type() == &DataType::Utf8)
            .unwrap_or(false);
        if !is_utf8_key {
            return Err(Error::Schema {
                table: "geometry".into(),
                reason: format!("no Utf8 key attribute `{}`", key_attribute),
            });
        }
        Ok(Self {
            attributes,
            geometries,
            key_attribute,
        })
    }

    pub fn attributes(&self) -> &RecordBatch {
        &self.attributes
    }

    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// ISO-3 code per record; null where the source left it blank.
    pub fn keys(&self) -> &StringArray {
        // checked in `new`
        self.attributes
            .column_by_name(&self.key_attribute)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .expect("key attribute is Utf8")
    }
}

/// Resolve `path` to a `.shp` file: either `path` itself or the first
/// `.shp` found below it.
fn locate_shp(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    let pattern = format!(
        "{}/**/*.shp",
        glob::Pattern::escape(&path.display().to_string())
    );
    let mut found: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| Error::archive(path.display().to_string(), e))?
        .filter_map(|entry| entry.ok())
        .collect();
    found.sort();
    if found.len() > 1 {
        warn!(count = found.len(), "several .shp files found, using the first");
    }
    found
        .into_iter()
        .next()
        .ok_or_else(|| Error::archive(path.display().to_string(), "no .shp file found"))
}

fn shapefile_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Shapefile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

fn field_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        FieldValue::Numeric(n) => n.map(format_number),
        FieldValue::Float(f) => f.map(|f| format_number(f as f64)),
        FieldValue::Double(d) => Some(format_number(*d)),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        _ => None,
    }
}

fn to_geometry(shape: Shape, index: usize) -> Geometry<f64> {
    if let Shape::NullShape = shape {
        return Geometry::GeometryCollection(GeometryCollection(Vec::new()));
    }
    match Geometry::<f64>::try_from(shape) {
        Ok(geometry) => geometry,
        Err(e) => {
            warn!(record = index, error = %e, "unconvertible shape kept as empty geometry");
            Geometry::GeometryCollection(GeometryCollection(Vec::new()))
        }
    }
}

/// Load a boundary layer into a [`PolygonCollection`].
///
/// `path` is a `.shp` file or a directory holding one. Every record is
/// kept. The key attribute is the first of `key_preference` present in
/// the attribute table.
#[instrument(level = "info", skip(path, key_preference), fields(path = %path.as_ref().display()))]
pub fn load_geometry<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    key_preference: &[S],
) -> Result<PolygonCollection> {
    let shp = locate_shp(path.as_ref())?;

    let dbf = shp.with_extension("dbf");
    let field_names: Vec<String> = dbase::Reader::from_path(&dbf)
        .map_err(|e| shapefile_error(&shp, e))?
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        // dbase reports its deletion marker as a pseudo field
        .filter(|name| name != "DeletionFlag")
        .collect();

    let key_attribute = key_preference
        .iter()
        .map(AsRef::as_ref)
        .find(|k| field_names.iter().any(|f| f.as_str() == *k))
        .ok_or_else(|| Error::Schema {
            table: shp.display().to_string(),
            reason: format!(
                "none of the key attributes {:?} present in {:?}",
                key_preference.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
                field_names
            ),
        })?
        .to_string();

    let mut reader = shapefile::Reader::from_path(&shp).map_err(|e| shapefile_error(&shp, e))?;
    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); field_names.len()];
    let mut geometries = Vec::new();
    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| shapefile_error(&shp, e))?;
        for (column, name) in values.iter_mut().zip(&field_names) {
            column.push(record.get(name).and_then(field_text));
        }
        geometries.push(to_geometry(shape, index));
    }

    let fields: Vec<Field> = field_names
        .iter()
        .map(|n| Field::new(n.as_str(), DataType::Utf8, true))
        .collect();
    let arrays: Vec<ArrayRef> = values
        .into_iter()
        .map(|col| Arc::new(StringArray::from(col)) as ArrayRef)
        .collect();
    let attributes = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

    let collection = PolygonCollection::new(attributes, geometries, key_attribute)?;
    let missing_keys = collection.keys().null_count();
    if missing_keys > 0 {
        debug!(missing_keys, "records without a key will never match");
    }
    info!(
        records = collection.len(),
        key = collection.key_attribute(),
        "loaded geometry"
    );
    Ok(collection)
}
