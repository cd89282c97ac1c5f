//! Plugin types for grafthost
//!
//! Data model for a unit before loading (`PluginCandidate`), its
//! self-description (`Manifest` / `EntryPointRef`), and its lifecycle
//! state once resident (`UnitState`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File extension that marks a loose-source unit.
pub const SOURCE_EXT: &str = "src";

/// File extension that marks an archive-packaged unit.
pub const ARCHIVE_EXT: &str = "pkg";

/// Entries whose file name starts with this prefix are package-internal
/// markers and never discovered as units.
pub const RESERVED_PREFIX: &str = "__";

/// Name of the descriptor entry inside an archive unit.
pub const DESCRIPTOR_NAME: &str = "description.manifest";

/// How a discovered unit is packaged on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A single `.src` file dropped into the plugins directory.
    LooseFile,
    /// A `.pkg` zip container with an internal descriptor.
    Archive,
}

/// One discoverable unit, identified before any loading happens.
///
/// Created per discovery pass and discarded after the load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCandidate {
    /// Packaging of the unit.
    pub kind: SourceKind,
    /// Filesystem path of the `.src` file or `.pkg` archive.
    pub path: PathBuf,
}

impl PluginCandidate {
    pub fn new(kind: SourceKind, path: PathBuf) -> Self {
        Self { kind, path }
    }

    /// Unit identifier derived from the file stem, used for error
    /// reporting before a manifest name is available.
    pub fn unit_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// Reference to a unit's loadable entry point: a module path plus the
/// symbol within that module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointRef {
    /// Dotted module path, resolved under the unit's code root.
    pub module_path: String,
    /// Symbol name within the resolved module.
    pub symbol_name: String,
}

impl EntryPointRef {
    /// Split a `code` value (`<module-path>.<SymbolName>`) on its last
    /// separator. Returns `None` when there is no separator to split on.
    pub fn parse(code: &str) -> Option<Self> {
        let (module_path, symbol_name) = code.rsplit_once('.')?;
        if module_path.is_empty() || symbol_name.is_empty() {
            return None;
        }
        Some(Self {
            module_path: module_path.to_string(),
            symbol_name: symbol_name.to_string(),
        })
    }

    /// Re-serialize to the manifest `code` form.
    pub fn to_code(&self) -> String {
        format!("{}.{}", self.module_path, self.symbol_name)
    }

    /// Relative file backing the module: `a.b.c` maps to `a/b/c.src`.
    /// The same rule applies over directory trees and mounted archives.
    pub fn module_file(&self) -> PathBuf {
        let mut path: PathBuf = self.module_path.split('.').collect();
        path.set_extension(SOURCE_EXT);
        path
    }
}

/// The descriptor a unit ships to name itself and its entry point.
///
/// All three fields are required and non-empty; absence is a load error,
/// never a silent skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unit name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Entry point to load.
    pub entry_point: EntryPointRef,
}

/// Lifecycle states a unit moves through inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Discovered,
    Loaded,
    Started,
    Stopped,
    Detached,
}

/// Whether a directory entry name is eligible for discovery at all.
pub fn is_reserved_name(file_name: &str) -> bool {
    file_name.starts_with(RESERVED_PREFIX)
}

/// Classify a path by extension; `None` for anything unrecognized.
pub fn classify(path: &Path) -> Option<SourceKind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == SOURCE_EXT => Some(SourceKind::LooseFile),
        Some(ext) if ext == ARCHIVE_EXT => Some(SourceKind::Archive),
        _ => None,
    }
}
