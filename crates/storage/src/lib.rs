//! # Storage
//!
//! Artifact storage for fetched resources.
//!
//! File names are derived from the resource identity only, so storing the
//! same resource twice writes the same file.

mod fs;
mod naming;

pub use fs::FsArtifactStore;
pub use naming::artifact_file_name;
