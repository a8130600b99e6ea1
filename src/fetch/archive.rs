// src/fetch/archive.rs

use std::{
    fs::{self, File},
    io::{self, Cursor, Read},
    path::Path,
};
use thiserror::Error;
use tracing::debug;
use zip::{result::ZipError, ZipArchive};

#[derive(Error, Debug)]
pub enum ArchiveFailure {
    #[error("not a readable zip archive: {0}")]
    Zip(#[from] ZipError),
    #[error("archive contains no .csv entry")]
    NoCsvEntry,
    #[error("{0}")]
    Io(#[from] io::Error),
}

fn is_csv(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Return the bytes of the CSV entry whose file name equals `expected`,
/// or of the first CSV entry if none does. Entry names inside the archive
/// are matched on their final path component only.
pub fn read_csv_entry(bytes: &[u8], expected: &str) -> Result<Vec<u8>, ArchiveFailure> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut candidates: Vec<(usize, String)> = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_file() && is_csv(&name) {
            candidates.push((i, name));
        }
    }

    let (index, name) = candidates
        .iter()
        .find(|(_, name)| {
            Path::new(name)
                .file_name()
                .map(|f| f == expected)
                .unwrap_or(false)
        })
        .or_else(|| candidates.first())
        .cloned()
        .ok_or(ArchiveFailure::NoCsvEntry)?;
    debug!(entry = %name, of = candidates.len(), "selected csv entry");

    let mut entry = archive.by_index(index)?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Extract every entry of the zip at `archive_path` into `dest_dir`.
/// Extraction goes through a sibling staging directory so a failure leaves
/// `dest_dir` absent rather than half-populated.
pub fn extract_all(archive_path: &Path, dest_dir: &Path) -> Result<(), ArchiveFailure> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut staging = dest_dir.as_os_str().to_owned();
    staging.push(".extracting");
    let staging = Path::new(&staging).to_path_buf();
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }

    if let Err(e) = archive.extract(&staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e.into());
    }
    if dest_dir.exists() {
        fs::remove_dir_all(dest_dir)?;
    }
    fs::rename(&staging, dest_dir)?;
    debug!(entries = archive.len(), dir = %dest_dir.display(), "extracted archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::zip_bytes;

    #[test]
    fn single_csv_is_used_whatever_its_name() {
        let bytes = zip_bytes(&[("only.csv", b"a,b\n".as_slice())]);
        assert_eq!(read_csv_entry(&bytes, "x.csv").unwrap(), b"a,b\n");
    }

    #[test]
    fn matches_csv_extension_case_insensitively() {
        let bytes = zip_bytes(&[("DATA.CSV", b"Code\n".as_slice())]);
        assert_eq!(read_csv_entry(&bytes, "data.csv").unwrap(), b"Code\n");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            read_csv_entry(b"definitely not a zip", "x.csv"),
            Err(ArchiveFailure::Zip(_))
        ));
    }
}
