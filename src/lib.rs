//! Country-level environmental indicators joined onto country boundaries.
//!
//! Sources are fetched into a local cache, tabular ones are normalized to one
//! row per ISO code, and every indicator is left-joined onto the boundary
//! layer so each country keeps exactly one row.

pub mod config;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod merge;
pub mod pipeline;
pub mod source;
pub mod table;
pub mod view;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, PipelineError, Result};
pub use merge::{CollisionPolicy, MergedTable};
pub use pipeline::{Pipeline, PipelineOutput};
pub use source::{ArchiveKind, SourceDescriptor};
