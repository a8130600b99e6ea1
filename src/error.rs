// src/error.rs

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transfer of {url} failed: {reason}")]
    Transfer { url: String, reason: String },

    #[error("archive {location}: {reason}")]
    Archive { location: String, reason: String },

    #[error("schema error in {table}: {reason}")]
    Schema { table: String, reason: String },

    #[error("column `{column}` from {table} collides with an existing column")]
    Collision { column: String, table: String },

    #[error("invalid source descriptor: {0}")]
    InvalidSource(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("shapefile error in {}: {reason}", path.display())]
    Shapefile { path: PathBuf, reason: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(location: impl Into<String>, reason: impl ToString) -> Self {
        Error::Archive {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions surfaced to the caller of [`crate::pipeline::Pipeline::run`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no geometry source was supplied")]
    MissingGeometry,

    #[error("{0} geometry sources were supplied, expected exactly one")]
    MultipleGeometry(usize),

    #[error("target file `{0}` is declared by more than one source")]
    DuplicateTarget(String),

    #[error("geometry source {url} failed")]
    Geometry {
        url: String,
        #[source]
        source: Error,
    },

    #[error("merge failed")]
    Merge(#[source] Error),
}
