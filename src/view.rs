// src/view.rs
//! Read-side helpers over a [`MergedTable`] for map and chart consumers.

use arrow::{
    array::{Array, Float64Array, StringArray},
    compute::cast,
    datatypes::DataType,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::merge::MergedTable;

/// Attributes tried, in order, for a country's display name.
pub const LABEL_ATTRIBUTES: &[&str] = &["NAME", "ADMIN"];

/// Highest and lowest values of one metric, each with its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extremes {
    /// Descending.
    pub top: Vec<(String, f64)>,
    /// Ascending.
    pub bottom: Vec<(String, f64)>,
}

impl MergedTable {
    /// `name` as floats; nulls and values that don't parse as numbers are null.
    pub fn numeric_column(&self, name: &str) -> Result<Float64Array> {
        let column = self.column(name).ok_or_else(|| Error::Schema {
            table: "merged".into(),
            reason: format!("no column `{}`", name),
        })?;
        let floats = cast(column.as_ref(), &DataType::Float64)?;
        floats
            .as_any()
            .downcast_ref::<Float64Array>()
            .cloned()
            .ok_or_else(|| Error::Schema {
                table: "merged".into(),
                reason: format!("column `{}` did not cast to Float64", name),
            })
    }

    /// The join key of every row.
    pub fn keys(&self) -> &StringArray {
        // the key attribute comes from a PolygonCollection, which checks it is Utf8
        self.column(self.key_attribute())
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .expect("key attribute is Utf8")
    }

    /// Display name per row, from the first of [`LABEL_ATTRIBUTES`] present.
    /// Rows without one fall back to their key, then to an empty string.
    pub fn labels(&self) -> Vec<String> {
        let keys = self.keys();
        let names = LABEL_ATTRIBUTES
            .iter()
            .find_map(|attr| self.column(attr))
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());

        (0..self.num_rows())
            .map(|row| {
                names
                    .filter(|n| n.is_valid(row))
                    .map(|n| n.value(row))
                    .or_else(|| keys.is_valid(row).then(|| keys.value(row)))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    /// Number of rows holding a numeric value for `metric`.
    pub fn coverage(&self, metric: &str) -> Result<usize> {
        let values = self.numeric_column(metric)?;
        Ok(values.len() - values.null_count())
    }

    /// The `n` highest and `n` lowest labelled values of `metric`.
    /// NaN and null values are left out.
    pub fn extremes(&self, metric: &str, n: usize) -> Result<Extremes> {
        let values = self.numeric_column(metric)?;
        let mut ranked: Vec<(String, f64)> = self
            .labels()
            .into_iter()
            .zip(values.iter())
            .filter_map(|(label, v)| v.filter(|v| !v.is_nan()).map(|v| (label, v)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let top = ranked.iter().take(n).cloned().collect();
        let bottom = ranked.iter().rev().take(n).cloned().collect();
        Ok(Extremes { top, bottom })
    }
}
