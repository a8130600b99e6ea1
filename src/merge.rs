// src/merge.rs

use arrow::{
    array::{Array, ArrayRef, StringArray, UInt32Array},
    compute::take,
    datatypes::{Field, FieldRef, Schema},
    record_batch::RecordBatch,
};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::geometry::PolygonCollection;
use crate::table::IndicatorTable;

/// What to do when an indicator brings a column name that is already
/// present in the merged table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the first column seen under a name; drop later ones.
    #[default]
    KeepFirst,
    /// Fail with [`Error::Collision`].
    Strict,
}

/// The polygon collection extended with every joined indicator column.
/// Always has exactly one row per polygon.
#[derive(Debug, Clone)]
pub struct MergedTable {
    attributes: RecordBatch,
    geometries: Vec<Geometry<f64>>,
    key_attribute: String,
}

impl MergedTable {
    pub fn attributes(&self) -> &RecordBatch {
        &self.attributes
    }

    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    pub fn num_rows(&self) -> usize {
        self.attributes.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.attributes
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.attributes.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.attributes.column_by_name(name)
    }
}

/// For each polygon key, the row of `codes` holding the same code, or
/// null. Repeated codes resolve to their first row.
fn join_indices(keys: &StringArray, codes: &StringArray) -> UInt32Array {
    let mut index: HashMap<&str, u32> = HashMap::with_capacity(codes.len());
    for (row, code) in codes.iter().enumerate() {
        if let Some(code) = code {
            index.entry(code).or_insert(row as u32);
        }
    }
    keys.iter()
        .map(|key| key.and_then(|k| index.get(k).copied()))
        .collect()
}

/// Left-join each indicator onto `polygons`, in order, polygon key to `Code`.
///
/// The polygon side is always the base, so the result has exactly
/// `polygons.len()` rows whatever the indicator coverage. Countries an
/// indicator lacks get nulls. Empty indicators are skipped. `Code` itself
/// is not carried over; the polygon key attribute already holds it.
#[instrument(level = "info", skip_all, fields(polygons = polygons.len(), tables = indicators.len()))]
pub fn merge(
    polygons: &PolygonCollection,
    indicators: &[IndicatorTable],
    policy: CollisionPolicy,
) -> Result<MergedTable> {
    let base = polygons.attributes();
    let keys = polygons.keys();

    let mut fields: Vec<FieldRef> = base.schema().fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = base.columns().to_vec();
    let mut names: HashSet<String> = fields.iter().map(|f| f.name().clone()).collect();

    for table in indicators {
        if table.is_empty() {
            debug!(table = table.name(), "skipping empty indicator table");
            continue;
        }

        let indices = join_indices(keys, table.codes());
        let schema = table.batch().schema();
        let mut added = 0usize;
        for (field, column) in schema
            .fields()
            .iter()
            .zip(table.batch().columns())
            .skip(1)
        {
            if names.contains(field.name()) {
                match policy {
                    CollisionPolicy::KeepFirst => {
                        debug!(
                            table = table.name(),
                            column = %field.name(),
                            "column already present, keeping first"
                        );
                        continue;
                    }
                    CollisionPolicy::Strict => {
                        return Err(Error::Collision {
                            column: field.name().clone(),
                            table: table.name().to_string(),
                        });
                    }
                }
            }

            let joined = take(column.as_ref(), &indices, None)?;
            fields.push(Arc::new(Field::new(
                field.name(),
                field.data_type().clone(),
                true,
            )));
            columns.push(joined);
            names.insert(field.name().clone());
            added += 1;
        }

        let matched = indices.len() - indices.null_count();
        info!(
            table = table.name(),
            matched,
            unmatched = polygons.len() - matched,
            columns = added,
            "joined indicator"
        );
    }

    let attributes = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    debug_assert_eq!(attributes.num_rows(), polygons.len());
    Ok(MergedTable {
        attributes,
        geometries: polygons.geometries().to_vec(),
        key_attribute: polygons.key_attribute().to_string(),
    })
}
