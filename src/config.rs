// src/config.rs

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::{Error, Result},
    merge::CollisionPolicy,
    source::{self, ArchiveKind, SourceDescriptor},
};

/// Top-level YAML configuration. Every section is optional; missing
/// sections fall back to the built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub fetch: FetchConfig,
    pub merge: MergeConfig,
    pub geometry: GeometryConfig,
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub collision_policy: CollisionPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    /// ISO-3 attribute names to try, in order.
    pub key_attributes: Vec<String>,
}

/// Unvalidated source entry as written in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    pub url: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: ArchiveKind,
}

fn default_kind() -> ArchiveKind {
    ArchiveKind::Plain
}

pub const DEFAULT_KEY_ATTRIBUTES: &[&str] = &["ADM0_A3", "ISO_A3"];

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            key_attributes: DEFAULT_KEY_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("downloads"),
            fetch: FetchConfig::default(),
            merge: MergeConfig::default(),
            geometry: GeometryConfig::default(),
            sources: source::DEFAULT_SOURCES
                .iter()
                .map(|(url, target, kind)| SourceEntry {
                    url: url.to_string(),
                    target: target.map(str::to_string),
                    kind: *kind,
                })
                .collect(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        if config.fetch.connect_timeout_secs == 0 || config.fetch.read_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be greater than zero".into()));
        }
        if config.geometry.key_attributes.is_empty() {
            return Err(Error::Config(
                "geometry.key_attributes must name at least one attribute".into(),
            ));
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Validate every entry into a [`SourceDescriptor`], preserving order.
    pub fn descriptors(&self) -> Result<Vec<SourceDescriptor>> {
        self.sources
            .iter()
            .map(|e| SourceDescriptor::new(&e.url, e.target.as_deref(), e.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = r#"
cache_dir: /tmp/okavango
merge:
  collision_policy: strict
sources:
  - url: https://example.com/forest.csv
    target: forest.csv
  - url: https://example.com/deforestation.zip
    target: deforestation.csv
    kind: zipped_csv
  - url: https://example.com/countries.zip
    kind: zipped_geometry
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/okavango"));
        assert_eq!(config.fetch.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.fetch.read_timeout(), Duration::from_secs(60));
        assert_eq!(config.merge.collision_policy, CollisionPolicy::Strict);
        assert_eq!(config.geometry.key_attributes, vec!["ADM0_A3", "ISO_A3"]);

        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].kind(), ArchiveKind::Plain);
        assert_eq!(descriptors[1].kind(), ArchiveKind::ZippedCsv);
        assert!(descriptors[2].is_geometry());
    }

    #[test]
    fn invalid_url_fails_descriptor_validation() {
        let yaml = "sources:\n  - url: not-a-url\n    target: x.csv\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert!(matches!(config.descriptors(), Err(Error::InvalidSource(_))));
    }

    #[test]
    fn rejects_unknown_keys_and_zero_timeouts() {
        assert!(matches!(
            Config::from_yaml_str("cache_dirr: x\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("fetch:\n  connect_timeout_secs: 0\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn default_config_uses_builtin_sources() {
        let config = Config::default();
        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors.len(), source::DEFAULT_SOURCES.len());
        assert_eq!(config.cache_dir, PathBuf::from("downloads"));
    }
}
