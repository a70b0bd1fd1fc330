//! Module manifest parsing and validation
//!
//! Handles parsing `module.toml` manifests into module metadata.

use crate::module::traits::{LoadingMode, ModuleError, ModuleInfo};
use crate::utils::version::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Module manifest (module.toml structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module name
    pub name: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Catalog key of the compiled-in module implementing this unit
    pub entry_point: String,
    /// Minimum host version the module was built against
    #[serde(default)]
    pub host_version: Option<String>,
    #[serde(default)]
    pub loading_mode: LoadingMode,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

impl ModuleManifest {
    /// Load manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to read manifest file: {}", e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to parse manifest TOML: {}", e))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.name.trim().is_empty() {
            return Err(ModuleError::InvalidManifest(
                "Module name cannot be empty".to_string(),
            ));
        }
        if self.entry_point.trim().is_empty() {
            return Err(ModuleError::InvalidManifest(
                "Entry point cannot be empty".to_string(),
            ));
        }
        if let Some(host_version) = &self.host_version {
            if !Version::is_valid(host_version) {
                return Err(ModuleError::InvalidManifest(format!(
                    "Invalid host_version \"{}\"",
                    host_version
                )));
            }
        }
        Ok(())
    }

    /// Declared metadata, before the module itself is consulted
    pub fn to_module_info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            host_version: self.host_version.clone(),
            loading_mode: self.loading_mode,
        }
    }
}
