//! Module system traits and interfaces
//!
//! Defines the contract every loadable module implements and the metadata the
//! module manager records about it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::error::RemotingError;
use crate::module::collection::ComponentCollection;
use crate::module::manager::ModuleManager;
use crate::remoting::value::Value;
use crate::utils::version::VersionParseError;

/// When a module is loaded into hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadingMode {
    /// Loaded in every host, including child hosts created later
    Always,
    /// Loaded only where explicitly requested
    #[default]
    #[serde(other)]
    OnDemand,
}

/// Module metadata returned by [`Module::get_module_metadata`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    /// Module name
    pub name: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Minimum host version the module was built against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_version: Option<String>,
    #[serde(default)]
    pub loading_mode: LoadingMode,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            host_version: None,
            loading_mode: LoadingMode::OnDemand,
        }
    }

    pub fn host_version(mut self, host_version: impl Into<String>) -> Self {
        self.host_version = Some(host_version.into());
        self
    }

    pub fn loading_mode(mut self, loading_mode: LoadingMode) -> Self {
        self.loading_mode = loading_mode;
        self
    }
}

/// What the manager records per loaded module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLoadingInfo {
    /// Filesystem path or `builtin:<name>` of the unit
    pub location: String,
    #[serde(flatten)]
    pub info: ModuleInfo,
}

/// Component factory: receives resolved dependencies followed by call-site args
pub type ComponentDescriptor =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, ModuleError>> + Send + Sync>;

/// Named, DI-resolvable service registered by a module
#[derive(Clone)]
pub struct ComponentInfo {
    /// Unique key
    pub name: String,
    pub version: String,
    pub descriptor: ComponentDescriptor,
    /// Evaluate once and cache the result
    pub singleton: bool,
    /// Components resolved and passed positionally before call-site args
    pub deps: Vec<String>,
}

impl ComponentInfo {
    pub fn new<F, Fut>(name: impl Into<String>, version: impl Into<String>, descriptor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ModuleError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            version: version.into(),
            descriptor: Arc::new(move |args| Box::pin(descriptor(args))),
            singleton: false,
            deps: Vec::new(),
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|dep| dep.to_string()).collect();
        self
    }
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("singleton", &self.singleton)
            .field("deps", &self.deps)
            .finish()
    }
}

/// Module trait that all loadable modules implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Register components and describe the module.
    ///
    /// Called once at load time.
    fn get_module_metadata(&self, components: &mut ComponentCollection) -> Result<ModuleInfo, ModuleError>;

    /// Post-load hook.
    ///
    /// Called once, after every module of the same batch has registered its
    /// components, so it may resolve components of sibling modules.
    async fn initialize(&self, _manager: &ModuleManager) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Module system errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModuleError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid host version: {0}")]
    InvalidVersion(String),

    #[error("Module version incompatible: {0}")]
    VersionIncompatible(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("Component \"{0}\" has already been registered.")]
    DuplicateComponent(String),

    #[error("Host \"{0}\" already exists.")]
    DuplicateHost(String),

    #[error("Module dependency missing: {0}")]
    DependencyMissing(String),

    #[error("Module initialization failed: {0}")]
    InitializationError(String),

    #[error("Host process error: {0}")]
    ProcessError(String),

    #[error(transparent)]
    Remoting(#[from] RemotingError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Module operation failed: {0}")]
    OperationError(String),
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}

impl From<VersionParseError> for ModuleError {
    fn from(e: VersionParseError) -> Self {
        ModuleError::InvalidVersion(e.to_string())
    }
}

impl From<ModuleError> for RemotingError {
    fn from(e: ModuleError) -> Self {
        match e {
            ModuleError::Remoting(inner) => inner,
            other => RemotingError::Remote(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loading_mode_parsing() {
        let info: ModuleInfo =
            serde_json::from_value(json!({"name": "a", "version": "1.0.0", "loadingMode": "Always"}))
                .unwrap();
        assert_eq!(info.loading_mode, LoadingMode::Always);

        let info: ModuleInfo =
            serde_json::from_value(json!({"name": "a", "version": "1.0.0", "loadingMode": "Lazy"}))
                .unwrap();
        assert_eq!(info.loading_mode, LoadingMode::OnDemand);

        let info: ModuleInfo = serde_json::from_value(json!({"name": "a", "version": "1.0.0"})).unwrap();
        assert_eq!(info.loading_mode, LoadingMode::OnDemand);
    }

    #[test]
    fn test_loading_info_is_flat() {
        let loading = ModuleLoadingInfo {
            location: "/modules/a".to_string(),
            info: ModuleInfo::new("a", "1.0.0")
                .host_version("1.0.0")
                .loading_mode(LoadingMode::Always),
        };
        assert_eq!(
            serde_json::to_value(&loading).unwrap(),
            json!({
                "location": "/modules/a",
                "name": "a",
                "version": "1.0.0",
                "hostVersion": "1.0.0",
                "loadingMode": "Always"
            })
        );
    }

    #[test]
    fn test_module_error_into_remoting_error() {
        let err: RemotingError = ModuleError::DuplicateComponent("svc".to_string()).into();
        assert_eq!(
            err,
            RemotingError::Remote("Component \"svc\" has already been registered.".to_string())
        );
        let inner = RemotingError::UnknownReference("x".to_string());
        assert_eq!(RemotingError::from(ModuleError::Remoting(inner.clone())), inner);
    }
}
