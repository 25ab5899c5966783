//! Paths command handler.
//!
//! Displays all resolved paths for diagnostics and debugging.

use std::path::Path;

use anyhow::Result;

use pkgrelay_core::ResolvedPaths;

use crate::error::CliError;

/// Print resolved paths in `key = value` format.
///
/// Does not open the database.
pub fn execute(data_dir: Option<&Path>, packages_dir: Option<&Path>) -> Result<()> {
    let paths = ResolvedPaths::resolve(data_dir).map_err(|e| CliError::Config(e.to_string()))?;
    let packages = packages_dir.map_or_else(|| paths.data_root.join("packages"), Path::to_path_buf);
    println!("{paths}");
    println!("packages = {}", packages.display());
    Ok(())
}
