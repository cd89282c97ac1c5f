//! Code sources for grafthost
//!
//! A unit's code lives either in a plain directory tree (loose files, or
//! an archive extracted to staging) or inside a mounted archive that is
//! never unpacked. `CodeSource` is the single seam the loader resolves
//! module files through, so entry-point resolution is the same logical
//! operation over both kinds of root.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{HostError, Result};

/// A resolvable root that module files are read from.
pub trait CodeSource {
    /// Read the UTF-8 content of a module file, `Load` error if absent.
    fn read(&self, rel: &Path) -> Result<String>;

    /// Whether a module file exists under this root.
    fn contains(&self, rel: &Path) -> bool;

    /// Human-readable label for diagnostics.
    fn describe(&self) -> String;
}

/// A plain filesystem tree.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CodeSource for DirSource {
    fn read(&self, rel: &Path) -> Result<String> {
        let path = self.root.join(rel);
        std::fs::read_to_string(&path).map_err(|e| {
            HostError::Load(format!("cannot read module file {}: {e}", path.display()))
        })
    }

    fn contains(&self, rel: &Path) -> bool {
        self.root.join(rel).is_file()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// An archive mounted in place. Every read re-opens the archive and
/// decodes the entry; no files are written to disk.
pub struct ArchiveSource {
    archive_path: PathBuf,
}

impl ArchiveSource {
    pub fn new(archive_path: PathBuf) -> Self {
        Self { archive_path }
    }

    fn open(&self) -> Result<zip::ZipArchive<File>> {
        let file = File::open(&self.archive_path)?;
        Ok(zip::ZipArchive::new(file)?)
    }
}

impl CodeSource for ArchiveSource {
    fn read(&self, rel: &Path) -> Result<String> {
        let mut archive = self.open()?;
        let name = zip_entry_name(rel);
        let mut entry = archive.by_name(&name).map_err(|_| {
            HostError::Load(format!(
                "module file {name} not found in archive {}",
                self.archive_path.display()
            ))
        })?;
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        Ok(content)
    }

    fn contains(&self, rel: &Path) -> bool {
        match self.open() {
            Ok(archive) => archive.index_for_name(&zip_entry_name(rel)).is_some(),
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!("{} (mounted)", self.archive_path.display())
    }
}

/// Zip entries always use `/` separators regardless of platform.
fn zip_entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
