//! Plugin system for grafthost
//!
//! This module provides discovery, loading, and lifecycle management for
//! extension units. Units arrive in two packagings: a loose `.src` file
//! dropped into the plugins directory, or a `.pkg` zip archive carrying a
//! `description.manifest` descriptor naming its entry point.
//!
//! # Architecture
//!
//! - **types**: data model (`PluginCandidate`, `Manifest`, `EntryPointRef`, `UnitState`)
//! - **scanner**: directory walk classifying candidates
//! - **manifest**: INI-style descriptor parsing
//! - **archive**: zip extraction (with traversal containment) and mounting
//! - **source**: the `CodeSource` seam over directory trees and mounted archives
//! - **loader**: entry-point resolution and unit instantiation
//! - **registry**: ordered start/stop lifecycle driving
//!
//! # Plugin Directory Structure
//!
//! ```text
//! ~/.grafthost/plugins/
//! ├── announce.src           # loose unit, loaded directly
//! ├── plugin1.pkg            # archive unit
//! │   ├── description.manifest
//! │   └── plugin1.src
//! └── __internal.src         # reserved prefix, never discovered
//! ```
//!
//! # Example description.manifest
//!
//! ```text
//! [general]
//! name=plugin1
//! description=A hello-world plugin
//! code=plugin1.Plugin1
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use grafthost::host::Host;
//! use grafthost::plugins::{scan, PluginRegistry};
//!
//! let host = Arc::new(Host::new());
//! let mut registry = PluginRegistry::new(host).unwrap();
//! let candidates = scan(Path::new("/home/user/.grafthost/plugins")).unwrap();
//! let summary = registry.activate_all(candidates);
//! println!("{} units started, {} failed", summary.started, summary.failed);
//! ```

pub mod archive;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod scanner;
pub mod source;
pub mod types;

pub use manifest::read_manifest;
pub use registry::{ActivationSummary, ErrorReporter, PluginRegistry, TracingReporter};
pub use scanner::{scan, Scan};
pub use types::{EntryPointRef, Manifest, PluginCandidate, SourceKind, UnitState};
