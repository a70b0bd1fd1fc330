//! Module registry
//!
//! Manifest parsing, discovery of units on disk and the catalog of
//! compiled-in module implementations.

pub mod catalog;
pub mod discovery;
pub mod manifest;

pub use catalog::{ModuleCatalog, ModuleFactory, BUILTIN_PREFIX};
pub use discovery::{discover_module, list_units, DiscoveredModule, MANIFEST_FILE};
pub use manifest::ModuleManifest;
