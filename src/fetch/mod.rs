// src/fetch/mod.rs

use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::source::{ArchiveKind, SourceDescriptor};

pub mod archive;
pub mod http;

pub use http::HttpTransport;

/// The one network operation the fetcher needs: a GET whose body is read
/// as a stream. Non-success statuses must surface as [`Error::Transfer`].
pub trait Transport {
    fn get(&self, url: &Url) -> Result<Box<dyn Read + '_>>;
}

/// Make `source` available under `cache_dir` and return its local path.
///
/// Plain and zipped CSVs land at `<cache_dir>/<target>`. A geometry set is
/// kept as `<cache_dir>/<stem>.zip` and extracted into `<cache_dir>/<stem>/`,
/// whose path is returned. An artifact already on disk is returned without
/// touching the network.
#[instrument(level = "info", skip(transport, source, cache_dir), fields(source = %source.name()))]
pub fn fetch<T: Transport + ?Sized>(
    transport: &T,
    source: &SourceDescriptor,
    cache_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir).map_err(|e| Error::io(cache_dir, e))?;

    match source.kind() {
        ArchiveKind::Plain => fetch_plain(transport, source, cache_dir),
        ArchiveKind::ZippedCsv => fetch_zipped_csv(transport, source, cache_dir),
        ArchiveKind::ZippedGeometry => fetch_geometry(transport, source, cache_dir),
    }
}

fn target_path(source: &SourceDescriptor, cache_dir: &Path) -> Result<PathBuf> {
    source
        .target()
        .map(|t| cache_dir.join(t))
        .ok_or_else(|| Error::InvalidSource(format!("{} has no target file", source.url())))
}

fn fetch_plain<T: Transport + ?Sized>(
    transport: &T,
    source: &SourceDescriptor,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let dest = target_path(source, cache_dir)?;
    if dest.is_file() {
        debug!(path = %dest.display(), "cache hit");
        return Ok(dest);
    }

    info!(url = %source.url(), "downloading");
    let mut body = transport.get(source.url())?;
    write_atomically(&dest, |file| {
        io::copy(&mut body, file).map_err(|e| transfer_error(source.url(), e))
    })?;
    Ok(dest)
}

fn fetch_zipped_csv<T: Transport + ?Sized>(
    transport: &T,
    source: &SourceDescriptor,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let dest = target_path(source, cache_dir)?;
    if dest.is_file() {
        debug!(path = %dest.display(), "cache hit");
        return Ok(dest);
    }

    info!(url = %source.url(), "downloading zipped csv");
    let mut bytes = Vec::new();
    transport
        .get(source.url())?
        .read_to_end(&mut bytes)
        .map_err(|e| transfer_error(source.url(), e))?;

    let expected = source.target().unwrap_or_default();
    let csv = archive::read_csv_entry(&bytes, expected)
        .map_err(|e| Error::archive(source.url().as_str(), e))?;
    write_atomically(&dest, |file| {
        io::Write::write_all(file, &csv).map_err(|e| Error::io(&dest, e))
    })?;
    Ok(dest)
}

fn fetch_geometry<T: Transport + ?Sized>(
    transport: &T,
    source: &SourceDescriptor,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let stem = source.geometry_stem();
    let archive_path = cache_dir.join(format!("{}.zip", stem));
    let extract_dir = cache_dir.join(&stem);

    if has_entries(&extract_dir) {
        debug!(path = %extract_dir.display(), "cache hit");
        return Ok(extract_dir);
    }

    if archive_path.is_file() {
        info!(path = %archive_path.display(), "re-extracting cached archive");
    } else {
        info!(url = %source.url(), "downloading geometry archive");
        let mut body = transport.get(source.url())?;
        write_atomically(&archive_path, |file| {
            io::copy(&mut body, file).map_err(|e| transfer_error(source.url(), e))
        })?;
    }

    if let Err(e) = archive::extract_all(&archive_path, &extract_dir) {
        // a corrupt archive would otherwise be a permanent cache hit
        warn!(path = %archive_path.display(), error = %e, "removing unusable archive");
        let _ = fs::remove_file(&archive_path);
        return Err(Error::archive(source.url().as_str(), e));
    }
    Ok(extract_dir)
}

fn transfer_error(url: &Url, e: io::Error) -> Error {
    Error::Transfer {
        url: url.to_string(),
        reason: format!("reading body: {}", e),
    }
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Write through `<dest>.part` and rename into place, so an interrupted
/// transfer never looks like a cache hit.
fn write_atomically<F, R>(dest: &Path, write: F) -> Result<R>
where
    F: FnOnce(&mut File) -> Result<R>,
{
    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(".part");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
    let out = match write(&mut file) {
        Ok(out) => out,
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };
    file.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, dest).map_err(|e| Error::io(dest, e))?;
    Ok(out)
}
