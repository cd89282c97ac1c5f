//! grafthost - extensible plugin host with archive-packaged extension units

pub mod config;
pub mod error;
pub mod host;
pub mod plugins;

pub use config::HostConfig;
pub use error::{HostError, Result};
pub use host::Host;
