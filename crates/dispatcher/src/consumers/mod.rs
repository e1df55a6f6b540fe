//! Consumer implementations
//!
//! Contains LogConsumer and ManifestConsumer.

mod log;
mod manifest;

pub use self::log::LogConsumer;
pub use self::manifest::{ManifestConsumer, ManifestEntry};
