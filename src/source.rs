// src/source.rs

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// How the bytes behind a source URL are packaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    /// A CSV served as-is.
    Plain,
    /// A zip holding one (or more) CSVs, of which we keep one.
    ZippedCsv,
    /// A zip holding a full shapefile set (`.shp`, `.dbf`, `.shx`, ...).
    ZippedGeometry,
}

/// One remote input to the pipeline. Validated on construction, immutable after.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDescriptor {
    url: Url,
    target: Option<String>,
    kind: ArchiveKind,
}

impl SourceDescriptor {
    pub fn new(url: &str, target: Option<&str>, kind: ArchiveKind) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidSource(format!("`{}` is not a valid URL: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidSource(format!(
                "`{}` must use http or https",
                url
            )));
        }

        let target = target.map(str::trim).filter(|t| !t.is_empty());
        match (kind, target) {
            (ArchiveKind::ZippedGeometry, Some(t)) => {
                return Err(Error::InvalidSource(format!(
                    "geometry source {} must not declare a target file (got `{}`)",
                    url, t
                )));
            }
            (ArchiveKind::Plain | ArchiveKind::ZippedCsv, None) => {
                return Err(Error::InvalidSource(format!(
                    "tabular source {} needs a target file name",
                    url
                )));
            }
            _ => {}
        }
        if let Some(t) = target {
            if t.contains(&['/', '\\'][..]) || t == "." || t == ".." {
                return Err(Error::InvalidSource(format!(
                    "target `{}` must be a bare file name",
                    t
                )));
            }
        }

        Ok(Self {
            url,
            target: target.map(str::to_string),
            kind,
        })
    }

    /// A plain CSV source.
    pub fn csv(url: &str, target: &str) -> Result<Self> {
        Self::new(url, Some(target), ArchiveKind::Plain)
    }

    /// A zipped-CSV source.
    pub fn zipped_csv(url: &str, target: &str) -> Result<Self> {
        Self::new(url, Some(target), ArchiveKind::ZippedCsv)
    }

    /// The boundary-layer archive.
    pub fn geometry(url: &str) -> Result<Self> {
        Self::new(url, None, ArchiveKind::ZippedGeometry)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn is_geometry(&self) -> bool {
        self.kind == ArchiveKind::ZippedGeometry
    }

    /// Name used in logs and as the key of the normalized table.
    pub fn name(&self) -> String {
        match &self.target {
            Some(t) => t.clone(),
            None => self.geometry_stem(),
        }
    }

    /// Last URL path segment without its `.zip` suffix, e.g.
    /// `ne_110m_admin_0_countries`. Names both the cached archive and
    /// the directory it is extracted into.
    pub fn geometry_stem(&self) -> String {
        self.url
            .path_segments()
            .and_then(|segments| segments.last())
            .map(|name| name.strip_suffix(".zip").unwrap_or(name))
            .filter(|name| !name.is_empty())
            .unwrap_or("geometry")
            .to_string()
    }
}

/// OWID indicators plus the Natural Earth 1:110m admin-0 layer.
pub static DEFAULT_SOURCES: &[(&str, Option<&str>, ArchiveKind)] = &[
    (
        "https://ourworldindata.org/grapher/annual-change-forest-area.csv",
        Some("annual-change-forest-area.csv"),
        ArchiveKind::Plain,
    ),
    (
        "https://ourworldindata.org/grapher/annual-deforestation.csv",
        Some("annual-deforestation.csv"),
        ArchiveKind::Plain,
    ),
    (
        "https://ourworldindata.org/grapher/terrestrial-protected-areas.csv",
        Some("terrestrial-protected-areas.csv"),
        ArchiveKind::Plain,
    ),
    (
        "https://ourworldindata.org/grapher/share-degraded-land.csv",
        Some("share-degraded-land.csv"),
        ArchiveKind::Plain,
    ),
    (
        "https://ourworldindata.org/grapher/forest-area-as-share-of-land-area.csv",
        Some("forest-area-as-share-of-land-area.csv"),
        ArchiveKind::Plain,
    ),
    (
        "https://naciscdn.org/naturalearth/110m/cultural/ne_110m_admin_0_countries.zip",
        None,
        ArchiveKind::ZippedGeometry,
    ),
];

pub fn default_sources() -> Result<Vec<SourceDescriptor>> {
    DEFAULT_SOURCES
        .iter()
        .map(|(url, target, kind)| SourceDescriptor::new(url, *target, *kind))
        .collect()
}
