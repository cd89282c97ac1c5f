//! Discovery scanner for grafthost
//!
//! Walks the plugins directory and classifies each entry as a loose-source
//! or archive candidate. Unrecognized entries are silently skipped so
//! non-plugin files can coexist in the directory; only an unreadable root
//! is an error. Candidates are yielded in directory-listing order, which
//! is filesystem-dependent — callers must not assume any particular order.

use std::fs::ReadDir;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{HostError, Result};

use super::types::{classify, is_reserved_name, PluginCandidate};

/// Lazy stream of candidates from one directory listing. Re-invoking
/// `scan` re-reads the directory.
#[derive(Debug)]
pub struct Scan {
    entries: ReadDir,
}

/// Scan a plugins directory for candidate units.
///
/// Fails with `Discovery` when the directory does not exist or cannot be
/// read; every per-entry problem is skipped instead.
pub fn scan(dir: &Path) -> Result<Scan> {
    if !dir.is_dir() {
        return Err(HostError::Discovery(format!(
            "plugins root is not a readable directory: {}",
            dir.display()
        )));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| {
        HostError::Discovery(format!("cannot read plugins root {}: {e}", dir.display()))
    })?;
    Ok(Scan { entries })
}

impl Iterator for Scan {
    type Item = PluginCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            if is_reserved_name(&file_name) {
                debug!(entry = %file_name, "Skipping reserved entry");
                continue;
            }
            if !path.is_file() {
                continue;
            }

            match classify(&path) {
                Some(kind) => {
                    debug!(entry = %file_name, ?kind, "Discovered candidate");
                    return Some(PluginCandidate::new(kind, path));
                }
                None => {
                    debug!(entry = %file_name, "Skipping unrecognized entry");
                    continue;
                }
            }
        }
    }
}
