//! Archive extractor for grafthost
//!
//! Archive units are zip containers and untrusted input. `install`
//! materializes an archive into a staging directory; `mount` exposes it
//! as a code source without unpacking. Every entry name is validated
//! before anything touches disk: an unsafe name anywhere aborts the whole
//! install with the destination untouched.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{HostError, Result};

use super::source::ArchiveSource;
use super::types::DESCRIPTOR_NAME;

/// Extract an archive under `destination_root` and return the extracted
/// source root (`<destination_root>/<archive stem>`).
///
/// Runs in two passes: first validate every entry name, then extract.
/// A single unsafe entry fails the whole operation before any write, so a
/// late-discovered traversal attempt can never leave partial files behind.
pub fn install(archive_path: &Path, destination_root: &Path) -> Result<PathBuf> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // Pass 1: validate all entry names up front.
    let mut entries: Vec<PathBuf> = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        entries.push(validate_entry_name(entry.name())?);
    }

    let source_root = destination_root.join(archive_stem(archive_path));

    // Pass 2: extract.
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let target = source_root.join(&entries[index]);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        debug!(entry = %entries[index].display(), "Extracted archive entry");
    }

    info!(
        archive = %archive_path.display(),
        root = %source_root.display(),
        entries = archive.len(),
        "Installed archive unit"
    );
    Ok(source_root)
}

/// Expose an archive as a code source without unpacking it.
pub fn mount(archive_path: &Path) -> ArchiveSource {
    ArchiveSource::new(archive_path.to_path_buf())
}

/// Read the descriptor entry (`description.manifest`) out of an archive.
pub fn read_descriptor(archive_path: &Path) -> Result<String> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name(DESCRIPTOR_NAME).map_err(|_| {
        HostError::Manifest(format!(
            "archive {} has no {DESCRIPTOR_NAME} entry",
            archive_path.display()
        ))
    })?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

/// Validate one entry name and return its contained relative path.
///
/// Rejected outright: absolute names, drive-prefixed names, and any name
/// with a `..` segment. Resolution against the destination therefore
/// cannot escape it.
fn validate_entry_name(name: &str) -> Result<PathBuf> {
    let rooted = name.starts_with('/') || name.starts_with('\\');
    let drive_prefixed = name.len() >= 2 && name.as_bytes()[1] == b':';
    let traverses = name.split(['/', '\\']).any(|part| part == "..");
    if rooted || drive_prefixed || traverses {
        return Err(HostError::UnsafePath(name.to_string()));
    }

    let relative: PathBuf = name
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    Ok(relative)
}

fn archive_stem(archive_path: &Path) -> String {
    archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unit".to_string())
}
