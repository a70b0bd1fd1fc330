//! Module system
//!
//! Loadable modules register named components into a dependency-injection
//! container owned by the [`ModuleManager`]. Managers form a host tree: a
//! component missing locally is looked up in child hosts and then in the
//! parent host, over object remoting proxies.
//!
//! ## Layout
//!
//! - [`traits`]: the module contract and its metadata
//! - [`container`] and [`collection`]: dependency injection
//! - [`policy`]: which units may load
//! - [`registry`]: units on disk and compiled-in implementations
//! - [`process`]: child host processes
//! - [`manager`]: loading, lookup and the host tree
//! - [`builtin`]: modules every host carries
//! - [`bootstrap`]: host startup in parent or child mode

pub mod bootstrap;
pub mod builtin;
pub mod collection;
pub mod container;
pub mod manager;
pub mod policy;
pub mod process;
pub mod registry;
pub mod traits;

pub use collection::ComponentCollection;
pub use container::DiContainer;
pub use manager::{
    ConstructorOptions, HostVersionMismatchHandler, ModuleManager, ModuleManagerObject,
    ModuleManagerOptions,
};
pub use policy::{DefaultModuleLoadingPolicy, ExactHostVersionPolicy, ModuleCandidate, ModuleLoadingPolicy};
pub use registry::{ModuleCatalog, ModuleManifest};
pub use traits::{ComponentInfo, LoadingMode, Module, ModuleError, ModuleInfo, ModuleLoadingInfo};
