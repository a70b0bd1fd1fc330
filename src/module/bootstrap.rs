//! Host bootstrap
//!
//! Parent mode builds a manager from the configuration and loads the built-in
//! modules plus the configured units. Child mode is entered when the process
//! was spawned by another host: the manager is rebuilt from the parent's
//! constructor options and talks to the parent over stdin/stdout.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::HostConfig;
use crate::ipc::channel::RawChannel;
use crate::ipc::communicator::{Communicator, CommunicatorOptions};
use crate::module::builtin;
use crate::module::manager::{ConstructorOptions, ModuleManager, ModuleManagerOptions};
use crate::module::registry::catalog::{ModuleCatalog, BUILTIN_PREFIX};
use crate::module::traits::ModuleError;
use crate::utils::signal::wait_for_shutdown_signal;

pub struct BootstrapOptions {
    pub config: HostConfig,
    /// Present when this process is a child host
    pub constructor_options: Option<ConstructorOptions>,
    pub catalog: Arc<ModuleCatalog>,
}

impl BootstrapOptions {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            constructor_options: None,
            catalog: Arc::new(ModuleCatalog::with_builtins()),
        }
    }
}

/// Run a host until it is told to stop
pub async fn run(options: BootstrapOptions) -> Result<(), ModuleError> {
    match options.constructor_options {
        Some(ref constructor_options) => {
            let parent = Communicator::from_channel(
                RawChannel::ParentProcess,
                CommunicatorOptions::with_id("parent")
                    .timeout(options.config.ipc.request_timeout())
                    .max_message_length(options.config.ipc.max_message_length),
            )?;
            let manager = start_child(
                &options.config,
                constructor_options,
                parent.clone(),
                Arc::clone(&options.catalog),
            )
            .await?;

            tokio::select! {
                _ = parent.closed() => info!("Parent host disconnected"),
                _ = wait_for_shutdown_signal() => {}
            }
            manager.shutdown().await;
            parent.dispose().await;
        }
        None => {
            let manager = start_parent(&options.config, Arc::clone(&options.catalog)).await?;
            wait_for_shutdown_signal().await;
            manager.shutdown().await;
        }
    }
    Ok(())
}

/// Build a top-level manager: built-in modules first, then configured
/// directories, then configured single units
pub async fn start_parent(
    config: &HostConfig,
    catalog: Arc<ModuleCatalog>,
) -> Result<ModuleManager, ModuleError> {
    let mut manager_options = ModuleManagerOptions::new(config.host_version())
        .catalog(catalog)
        .request_timeout(config.ipc.request_timeout())
        .max_message_length(config.ipc.max_message_length);
    if let Some(executable) = config.host_executable() {
        manager_options = manager_options.host_executable(executable);
    }
    let manager = ModuleManager::with_options(manager_options)?;

    for (name, _) in builtin::factories() {
        manager
            .load_module_async(&format!("{}{}", BUILTIN_PREFIX, name), None, false)
            .await?;
    }

    let respect = config.modules.respect_loading_mode;
    for dir in &config.modules.module_dirs {
        manager.load_module_dir_async(Path::new(dir), None, respect).await?;
    }
    for unit in &config.modules.modules {
        manager.load_module_async(unit, None, respect).await?;
    }

    info!(
        "Host {} started with {} modules",
        manager.host_version(),
        manager.loaded_modules().len()
    );
    Ok(manager)
}

/// Build a child manager connected to `parent` and load the parent's
/// initial modules
pub async fn start_child(
    config: &HostConfig,
    constructor_options: &ConstructorOptions,
    parent: Communicator,
    catalog: Arc<ModuleCatalog>,
) -> Result<ModuleManager, ModuleError> {
    let mut manager_options = ModuleManagerOptions::new(constructor_options.host_version.clone())
        .parent(parent)
        .catalog(catalog)
        .request_timeout(config.ipc.request_timeout())
        .max_message_length(config.ipc.max_message_length);
    if let Some(executable) = config.host_executable() {
        manager_options = manager_options.host_executable(executable);
    }
    let manager = ModuleManager::with_options(manager_options)?;

    for module in &constructor_options.initial_modules {
        if manager
            .load_module_async(&module.location, None, true)
            .await?
            .is_none()
        {
            warn!("Initial module {} was not loaded", module.location);
        }
    }

    info!(
        "Child host started with {} initial modules",
        constructor_options.initial_modules.len()
    );
    Ok(manager)
}
