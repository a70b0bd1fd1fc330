//! Catalog of compiled-in modules
//!
//! Maps a manifest `entry_point` (or a `builtin:<name>` location) to a factory
//! producing the [`Module`] instance.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::module::builtin;
use crate::module::traits::{Module, ModuleError};
use crate::utils::lock::{read, write};

/// Location prefix of built-in modules
pub const BUILTIN_PREFIX: &str = "builtin:";

pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn Module> + Send + Sync>;

#[derive(Default)]
pub struct ModuleCatalog {
    entries: RwLock<HashMap<String, ModuleFactory>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the `ipc`, `remoting` and `proxy.object` modules
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        for (name, factory) in builtin::factories() {
            catalog.register_factory(name, factory);
        }
        catalog
    }

    pub fn register<F, M>(&self, entry_point: impl Into<String>, factory: F)
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Module + 'static,
    {
        self.register_factory(entry_point, Arc::new(move || Arc::new(factory()) as Arc<dyn Module>));
    }

    pub fn register_factory(&self, entry_point: impl Into<String>, factory: ModuleFactory) {
        write(&self.entries).insert(entry_point.into(), factory);
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        read(&self.entries).contains_key(entry_point)
    }

    /// Instantiate the module registered for `entry_point`
    pub fn instantiate(&self, entry_point: &str) -> Result<Arc<dyn Module>, ModuleError> {
        let key = entry_point.strip_prefix(BUILTIN_PREFIX).unwrap_or(entry_point);
        let factory = read(&self.entries).get(key).cloned().ok_or_else(|| {
            ModuleError::ModuleNotFound(format!("No module registered for entry point \"{}\"", key))
        })?;
        Ok(factory())
    }

    pub fn entry_points(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.entries).keys().cloned().collect();
        names.sort();
        names
    }
}
