// src/testing.rs
//! Helpers shared by the unit tests: an in-memory transport, zip,
//! shapefile and table builders, and test logging.

use arrow::{
    array::{Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use std::{
    cell::Cell,
    collections::HashMap,
    fs,
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::fetch::Transport;
use crate::geometry::PolygonCollection;
use crate::table::IndicatorTable;

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,okavango=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Serves canned bodies by URL and counts every request. Unknown URLs
/// answer like a 404.
#[derive(Default)]
pub struct FakeTransport {
    responses: HashMap<String, Vec<u8>>,
    calls: Cell<usize>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        let key = Url::parse(url).expect("test url").to_string();
        self.responses.insert(key, body);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &Url) -> Result<Box<dyn Read + '_>> {
        self.calls.set(self.calls.get() + 1);
        match self.responses.get(url.as_str()) {
            Some(body) => Ok(Box::new(Cursor::new(body.as_slice()))),
            None => Err(Error::Transfer {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".into(),
            }),
        }
    }
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        for (name, data) in entries {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file(*name, options).expect("start zip entry");
            zip.write_all(data).expect("write zip entry");
        }
        zip.finish().expect("finish zip");
    }
    buf
}

/// Write `<dir>/<stem>.shp` (plus `.shx`/`.dbf`) with one unit square per
/// `(code, name)` row, the code stored under `key_field`.
pub fn write_countries_shapefile(
    dir: &Path,
    stem: &str,
    key_field: &str,
    rows: &[(&str, &str)],
) -> PathBuf {
    fs::create_dir_all(dir).expect("shapefile dir");
    let shp_path = dir.join(format!("{}.shp", stem));
    let builder = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from(key_field).expect("key field"), 3)
        .add_character_field(FieldName::try_from("NAME").expect("name field"), 40);

    let mut writer = shapefile::Writer::from_path(&shp_path, builder).expect("shapefile writer");
    for (i, (code, name)) in rows.iter().enumerate() {
        let x = i as f64 * 2.0;
        let square = Polygon::new(PolygonRing::Outer(vec![
            Point::new(x, 0.0),
            Point::new(x, 1.0),
            Point::new(x + 1.0, 1.0),
            Point::new(x + 1.0, 0.0),
            Point::new(x, 0.0),
        ]));
        let mut record = Record::default();
        record.insert(
            key_field.to_string(),
            FieldValue::Character(Some(code.to_string())),
        );
        record.insert("NAME".to_string(), FieldValue::Character(Some(name.to_string())));
        writer
            .write_shape_and_record(&square, &record)
            .expect("write shape");
    }
    drop(writer);
    shp_path
}

/// A zipped shapefile set as a geometry source would serve it.
pub fn geometry_zip_bytes(scratch: &Path, stem: &str, rows: &[(&str, &str)]) -> Vec<u8> {
    let shp = write_countries_shapefile(scratch, stem, "ADM0_A3", rows);
    let parts: Vec<(String, Vec<u8>)> = ["shp", "shx", "dbf"]
        .iter()
        .map(|ext| {
            let path = shp.with_extension(ext);
            (format!("{}.{}", stem, ext), fs::read(path).expect("shapefile part"))
        })
        .collect();
    let entries: Vec<(&str, &[u8])> = parts
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    zip_bytes(&entries)
}

/// An in-memory collection keyed by `ADM0_A3` with a `NAME` attribute and
/// one point per `(code, name)` row.
pub fn point_polygons(rows: &[(&str, &str)]) -> PolygonCollection {
    let schema = Schema::new(vec![
        Field::new("ADM0_A3", DataType::Utf8, true),
        Field::new("NAME", DataType::Utf8, true),
    ]);
    let codes: StringArray = rows.iter().map(|(c, _)| Some(*c)).collect();
    let names: StringArray = rows.iter().map(|(_, n)| Some(*n)).collect();
    let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(codes), Arc::new(names)])
        .expect("polygon attributes");
    let geometries = (0..rows.len())
        .map(|i| geo_types::Point::new(i as f64, i as f64).into())
        .collect();
    PolygonCollection::new(batch, geometries, "ADM0_A3").expect("polygon collection")
}

/// An indicator with a single Int64 `metric` column.
pub fn int_indicator(name: &str, metric: &str, rows: &[(&str, i64)]) -> IndicatorTable {
    let schema = Schema::new(vec![
        Field::new("Code", DataType::Utf8, false),
        Field::new(metric, DataType::Int64, true),
    ]);
    let codes: StringArray = rows.iter().map(|(c, _)| Some(*c)).collect();
    let values: Int64Array = rows.iter().map(|(_, v)| Some(*v)).collect();
    let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(codes), Arc::new(values)])
        .expect("indicator batch");
    IndicatorTable::new(name, batch).expect("indicator table")
}
