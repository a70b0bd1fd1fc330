//! Module discovery
//!
//! Scans module directories for loadable units. A unit is either a directory
//! holding `module.toml` or a standalone `*.toml` manifest file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::ModuleError;

/// Manifest file name inside a unit directory
pub const MANIFEST_FILE: &str = "module.toml";

/// Discovered module unit
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Unit path as found on disk
    pub location: PathBuf,
    pub manifest: ModuleManifest,
}

/// Manifest path of a unit, or `None` when `path` is not a unit
pub fn manifest_path(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        let manifest = path.join(MANIFEST_FILE);
        return manifest.is_file().then_some(manifest);
    }
    let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);
    (path.is_file() && is_toml).then(|| path.to_path_buf())
}

/// Read the manifest of the unit at `path`
pub fn discover_module(path: &Path) -> Result<DiscoveredModule, ModuleError> {
    let manifest = manifest_path(path).ok_or_else(|| {
        ModuleError::ModuleNotFound(format!("{} is not a module unit", path.display()))
    })?;
    Ok(DiscoveredModule {
        location: path.to_path_buf(),
        manifest: ModuleManifest::from_file(&manifest)?,
    })
}

/// List the units directly inside `dir`, in sorted order
pub fn list_units(dir: &Path) -> Result<Vec<PathBuf>, ModuleError> {
    if !dir.is_dir() {
        return Err(ModuleError::ModuleNotFound(format!(
            "Module directory {} does not exist",
            dir.display()
        )));
    }

    let mut units = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| {
        ModuleError::OperationError(format!("Failed to read modules directory: {}", e))
    })?;
    for entry in entries {
        let path = entry
            .map_err(|e| {
                ModuleError::OperationError(format!("Failed to read directory entry: {}", e))
            })?
            .path();
        if manifest_path(&path).is_some() {
            units.push(path);
        } else {
            debug!("Skipping {:?}: not a module unit", path);
        }
    }
    units.sort();

    info!("Discovered {} module units in {:?}", units.len(), dir);
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = "name = \"m\"\nversion = \"1.0.0\"\nentry_point = \"m\"\n";

    #[test]
    fn test_list_units_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        let b = temp.path().join("b-unit");
        fs::create_dir(&b).unwrap();
        fs::write(b.join(MANIFEST_FILE), MANIFEST).unwrap();
        fs::write(temp.path().join("a-unit.toml"), MANIFEST).unwrap();
        fs::write(temp.path().join("readme.txt"), "ignored").unwrap();
        fs::create_dir(temp.path().join("empty")).unwrap();

        let units = list_units(temp.path()).unwrap();
        assert_eq!(
            units,
            vec![temp.path().join("a-unit.toml"), temp.path().join("b-unit")]
        );
        assert_eq!(discover_module(&b).unwrap().manifest.name, "m");
    }

    #[test]
    fn test_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(list_units(&temp.path().join("nope")).is_err());
        assert!(discover_module(&temp.path().join("nope")).is_err());
    }
}
