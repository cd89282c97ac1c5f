//! Error types for grafthost
//!
//! This module defines all error types used throughout the host. Uses
//! `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for grafthost operations.
#[derive(Error, Debug)]
pub enum HostError {
    /// The configured plugins root is missing, unreadable, or not a directory.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A unit descriptor is malformed (missing section, missing key,
    /// unsplittable entry-point reference).
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// An archive entry name would escape the extraction root. Always aborts
    /// the whole archive's install, never sanitized away.
    #[error("Unsafe archive path: {0}")]
    UnsafePath(String),

    /// An entry point could not be resolved against its code root.
    #[error("Load error: {0}")]
    Load(String),

    /// A host operation was invoked but is not registered on the
    /// extension table.
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    /// A unit's own `start` or `stop` raised.
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// JSON serialization/deserialization errors (config file)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for grafthost operations.
pub type Result<T> = std::result::Result<T, HostError>;
