//! Local package registry adapters.

mod directory;

pub use directory::{DirectoryPackageRegistry, MANIFEST_FILE};
