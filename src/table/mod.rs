// src/table/mod.rs

use arrow::{
    array::{Array, StringArray},
    record_batch::RecordBatch,
};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

pub mod columns;
pub mod convert;
pub mod normalize;

pub use normalize::normalize;

/// Canonical name of the join key in every indicator table.
pub const KEY_COLUMN: &str = "Code";

/// A CSV exactly as read: header names and string cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Source name, used in diagnostics and to key the normalized table.
    pub name: String,
    pub headers: Vec<String>,
    /// One entry per record; rows may be shorter or longer than `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Cell `col` of `row`, or `""` past the end of a short record.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Read a CSV file into a [`RawTable`] named `name`.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv<P: AsRef<Path>>(name: &str, path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let table = read_csv(name, file).map_err(|source| Error::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        columns = table.headers.len(),
        rows = table.rows.len(),
        "loaded csv"
    );
    Ok(table)
}

pub fn read_csv<R: Read>(name: &str, reader: R) -> std::result::Result<RawTable, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // OWID exports start with a UTF-8 BOM
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            convert::clean_str(h)
        })
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(name, headers, rows))
}

/// A normalized per-country table: `Code` first, then metric columns.
/// Holds exactly one row per non-null `Code`.
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    name: String,
    batch: RecordBatch,
}

impl IndicatorTable {
    /// Wrap `batch`, checking that its first column is a non-null `Code`.
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Result<Self> {
        let name = name.into();
        let schema = batch.schema();
        let ok = schema
            .fields()
            .first()
            .map(|f| f.name() == KEY_COLUMN)
            .unwrap_or(false)
            && batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .map(|codes| codes.null_count() == 0)
                .unwrap_or(false);
        if !ok {
            return Err(Error::Schema {
                table: name,
                reason: format!("first column must be a non-null Utf8 `{}`", KEY_COLUMN),
            });
        }
        Ok(Self { name, batch })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn codes(&self) -> &StringArray {
        // checked in `new`
        self.batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("Code column is Utf8")
    }

    /// Metric column names, i.e. everything except `Code`.
    pub fn value_columns(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .skip(1)
            .map(|f| f.name().clone())
            .collect()
    }
}
