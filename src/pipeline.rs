// src/pipeline.rs

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{Error, PipelineError, Result};
use crate::fetch::{self, Transport};
use crate::geometry::load_geometry;
use crate::merge::{merge, CollisionPolicy, MergedTable};
use crate::source::SourceDescriptor;
use crate::table::{self, IndicatorTable};

/// Fetch, normalize, load and merge, in that order, over one transport
/// and one cache directory.
pub struct Pipeline<T: Transport> {
    transport: T,
    cache_dir: PathBuf,
    key_attributes: Vec<String>,
    policy: CollisionPolicy,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Normalized indicators that made it through, in source order.
    pub indicators: Vec<IndicatorTable>,
    pub merged: MergedTable,
}

impl PipelineOutput {
    /// Indicator columns present in the merged table, in source order.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for table in &self.indicators {
            for column in table.value_columns() {
                if self.merged.has_column(&column) && !names.contains(&column) {
                    names.push(column);
                }
            }
        }
        names
    }

    pub fn indicator(&self, name: &str) -> Option<&IndicatorTable> {
        self.indicators.iter().find(|t| t.name() == name)
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: T, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            cache_dir: cache_dir.into(),
            key_attributes: crate::config::DEFAULT_KEY_ATTRIBUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            policy: CollisionPolicy::default(),
        }
    }

    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(transport, config.cache_dir.clone())
            .with_key_attributes(config.geometry.key_attributes.clone())
            .with_collision_policy(config.merge.collision_policy)
    }

    pub fn with_key_attributes(mut self, key_attributes: Vec<String>) -> Self {
        self.key_attributes = key_attributes;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run every stage over `sources`, which must hold exactly one
    /// geometry source. Tabular sources that fail anywhere are skipped
    /// with a warning; geometry and merge failures end the run.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub fn run(&self, sources: &[SourceDescriptor]) -> std::result::Result<PipelineOutput, PipelineError> {
        let geometry_count = sources.iter().filter(|s| s.is_geometry()).count();
        match geometry_count {
            0 => return Err(PipelineError::MissingGeometry),
            1 => {}
            n => return Err(PipelineError::MultipleGeometry(n)),
        }
        // a shared target would make the second source a cache hit on the first
        let mut targets = HashSet::new();
        if let Some(dup) = sources
            .iter()
            .filter_map(|s| s.target())
            .find(|t| !targets.insert(*t))
        {
            return Err(PipelineError::DuplicateTarget(dup.to_string()));
        }

        let mut geometry_path = None;
        let mut tabular: Vec<(&SourceDescriptor, PathBuf)> = Vec::new();
        for source in sources {
            let fetched = fetch::fetch(&self.transport, source, &self.cache_dir);
            match (source.is_geometry(), fetched) {
                (true, Ok(path)) => geometry_path = Some((source, path)),
                (true, Err(e)) => {
                    return Err(PipelineError::Geometry {
                        url: source.url().to_string(),
                        source: e,
                    })
                }
                (false, Ok(path)) => tabular.push((source, path)),
                (false, Err(e)) => {
                    warn!(source = %source.name(), error = %e, "fetch failed, skipping source")
                }
            }
        }

        let mut indicators = Vec::with_capacity(tabular.len());
        for (source, path) in tabular {
            match self.prepare_indicator(source, &path) {
                Ok(table) => indicators.push(table),
                Err(e) => warn!(source = %source.name(), error = %e, "skipping source"),
            }
        }

        // counted above, so exactly one geometry source was fetched
        let (geometry_source, geometry_path) =
            geometry_path.ok_or(PipelineError::MissingGeometry)?;
        let polygons = load_geometry(&geometry_path, &self.key_attributes).map_err(|e| {
            PipelineError::Geometry {
                url: geometry_source.url().to_string(),
                source: e,
            }
        })?;

        let merged = merge(&polygons, &indicators, self.policy).map_err(PipelineError::Merge)?;
        info!(
            rows = merged.num_rows(),
            indicators = indicators.len(),
            columns = merged.attributes().num_columns(),
            "pipeline finished"
        );
        Ok(PipelineOutput { indicators, merged })
    }

    fn prepare_indicator(&self, source: &SourceDescriptor, path: &Path) -> Result<IndicatorTable> {
        let raw = table::load_csv(&source.name(), path)?;
        table::normalize(&raw)?.ok_or_else(|| Error::Schema {
            table: source.name(),
            reason: format!("no key-like column among {:?}", raw.headers),
        })
    }
}
