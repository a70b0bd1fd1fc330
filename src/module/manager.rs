//! Module manager
//!
//! Owns the dependency-injection container, loads module units, and keeps a
//! tree of hosts (child processes or in-process links) through which
//! components are resolved across process boundaries.
//!
//! Lookup order for [`ModuleManager::get_component_async`]: the local
//! container, then every host except the one the request came from in the
//! order the hosts were added, then the parent host unless the request came
//! from it. The first non-empty answer wins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{RemotingError, Result as RemotingResult};
use crate::ipc::channel::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::ipc::communicator::{Communicator, CommunicatorOptions};
use crate::ipc::pattern::RoutePattern;
use crate::module::collection::ComponentCollection;
use crate::module::container::{dedication, lazy_singleton, singleton, DependencyLookup, DiContainer};
use crate::module::policy::{DefaultModuleLoadingPolicy, ModuleCandidate, ModuleLoadingPolicy};
use crate::module::process::spawner::{HostProcess, HostProcessSpawner};
use crate::module::registry::catalog::{ModuleCatalog, BUILTIN_PREFIX};
use crate::module::registry::discovery::{discover_module, list_units};
use crate::module::traits::{ComponentInfo, LoadingMode, Module, ModuleError, ModuleInfo, ModuleLoadingInfo};
use crate::remoting::proxy::ObjectRemotingProxy;
use crate::remoting::value::{FunctionObject, RemoteObject, Value};
use crate::utils::error::log_error_async;
use crate::utils::lock::{lock, read, write};
use crate::utils::timeout::DEFAULT_REQUEST_TIMEOUT;
use crate::utils::version::Version;

/// Route serving manager actions sent by the parent host
pub const MODULE_MANAGER_PATTERN: &str = "/module-manager";
/// Route of the object remoting proxy between a manager and its hosts
pub const OBJECT_PROXY_PATTERN: &str = "/module-manager/object-proxy";
/// Component name under which every manager registers itself
pub const MODULE_MANAGER_COMPONENT: &str = "module-manager";

/// Decides whether a module requiring a newer host may load anyway:
/// `(module info, required host version, actual host version) -> accept`
pub type HostVersionMismatchHandler = Arc<dyn Fn(&ModuleInfo, &str, &str) -> bool + Send + Sync>;

/// Options a new host needs to rebuild an equivalent manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorOptions {
    pub host_version: String,
    #[serde(default)]
    pub initial_modules: Vec<ModuleLoadingInfo>,
}

#[derive(Clone)]
pub struct ModuleManagerOptions {
    pub host_version: String,
    /// Communicator to the parent host, in a child host
    pub parent: Option<Communicator>,
    pub catalog: Arc<ModuleCatalog>,
    /// Binary run for spawned hosts; the current executable when absent
    pub host_executable: Option<PathBuf>,
    /// Reply timeout of communicators to spawned hosts
    pub request_timeout: Duration,
    /// Longest message line exchanged with spawned hosts
    pub max_message_length: usize,
}

impl ModuleManagerOptions {
    pub fn new(host_version: impl Into<String>) -> Self {
        Self {
            host_version: host_version.into(),
            parent: None,
            catalog: Arc::new(ModuleCatalog::with_builtins()),
            host_executable: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }

    pub fn parent(mut self, parent: Communicator) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn catalog(mut self, catalog: Arc<ModuleCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn host_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.host_executable = Some(executable.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_message_length(mut self, max_length: usize) -> Self {
        self.max_message_length = max_length;
        self
    }
}

/// Where a component request came from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    Local,
    Host(String),
    Parent,
}

struct Host {
    proxy: ObjectRemotingProxy,
    process: Option<HostProcess>,
}

/// Module accepted by the load sequence, awaiting initialization
struct LoadedModule {
    loading_info: ModuleLoadingInfo,
    module: Arc<dyn Module>,
}

/// Parent-to-child manager action
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", content = "content")]
enum ManagerAction {
    #[serde(rename = "loadModuleAsync")]
    LoadModule(LoadRequest),
    #[serde(rename = "loadModuleDirAsync")]
    LoadModuleDir(LoadRequest),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadRequest {
    location: String,
    #[serde(default)]
    respect_loading_mode: bool,
}

struct ManagerInner {
    host_version: String,
    version: Version,
    container: DiContainer,
    catalog: Arc<ModuleCatalog>,
    host_executable: Option<PathBuf>,
    request_timeout: Duration,
    max_message_length: usize,
    /// Insertion ordered
    hosts: Mutex<Vec<(String, Host)>>,
    parent: RwLock<Option<ObjectRemotingProxy>>,
    loaded_modules: RwLock<Vec<ModuleLoadingInfo>>,
    policy: RwLock<Arc<dyn ModuleLoadingPolicy>>,
    mismatch_handler: RwLock<Option<HostVersionMismatchHandler>>,
}

/// Cheaply cloneable handle to one manager
#[derive(Clone)]
pub struct ModuleManager {
    inner: Arc<ManagerInner>,
}

impl ModuleManager {
    /// Create a manager for `host_version`, optionally connected to a parent
    pub fn new(host_version: &str, parent: Option<Communicator>) -> Result<Self, ModuleError> {
        let mut options = ModuleManagerOptions::new(host_version);
        options.parent = parent;
        Self::with_options(options)
    }

    pub fn with_options(options: ModuleManagerOptions) -> Result<Self, ModuleError> {
        let version = Version::parse(&options.host_version)?;
        let inner = Arc::new(ManagerInner {
            host_version: options.host_version,
            version,
            container: DiContainer::new(),
            catalog: options.catalog,
            host_executable: options.host_executable,
            request_timeout: options.request_timeout,
            max_message_length: options.max_message_length,
            hosts: Mutex::new(Vec::new()),
            parent: RwLock::new(None),
            loaded_modules: RwLock::new(Vec::new()),
            policy: RwLock::new(Arc::new(DefaultModuleLoadingPolicy)),
            mismatch_handler: RwLock::new(None),
        });
        let manager = Self { inner };

        manager.register(
            ComponentInfo {
                name: MODULE_MANAGER_COMPONENT.to_string(),
                version: manager.inner.host_version.clone(),
                descriptor: singleton(Value::object(ModuleManagerObject {
                    manager: manager.downgrade(),
                })),
                singleton: false,
                deps: Vec::new(),
            },
        )?;

        if let Some(parent) = options.parent {
            manager.attach_parent(parent)?;
        }

        info!("Module manager created (host version {})", manager.inner.host_version);
        Ok(manager)
    }

    /// Rebuild a manager from options produced by a parent's
    /// [`generate_constructor_options`](Self::generate_constructor_options).
    /// Initial modules are not loaded here.
    pub fn from_constructor_options(
        options: &ConstructorOptions,
        parent: Communicator,
        catalog: Arc<ModuleCatalog>,
    ) -> Result<Self, ModuleError> {
        Self::with_options(
            ModuleManagerOptions::new(options.host_version.clone())
                .parent(parent)
                .catalog(catalog),
        )
    }

    fn downgrade(&self) -> Weak<ManagerInner> {
        Arc::downgrade(&self.inner)
    }

    fn attach_parent(&self, parent: Communicator) -> Result<(), ModuleError> {
        let proxy = ObjectRemotingProxy::create(
            RoutePattern::exact(OBJECT_PROXY_PATTERN),
            parent.clone(),
            false,
            Some(format!("{}:parent", parent.id())),
        )?;
        self.install_resolver(&proxy, Origin::Parent);

        let weak = self.downgrade();
        parent.map(RoutePattern::exact(MODULE_MANAGER_PATTERN), move |_, _, body| {
            let weak = weak.clone();
            async move {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| RemotingError::Disposed("ModuleManager".to_string()))?;
                ModuleManager { inner }.on_action(body).await
            }
        })?;

        *write(&self.inner.parent) = Some(proxy);
        Ok(())
    }

    /// Answer the peer's resource requests with component lookups
    fn install_resolver(&self, proxy: &ObjectRemotingProxy, origin: Origin) {
        let weak = self.downgrade();
        proxy.set_resolver_fn(move |_proxy, name, args| {
            let weak = weak.clone();
            let origin = origin.clone();
            async move {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| RemotingError::Disposed("ModuleManager".to_string()))?;
                let found = ModuleManager { inner }
                    .resolve_component(&name, args, &origin)
                    .await?;
                Ok(found.unwrap_or_default())
            }
        });
    }

    async fn on_action(&self, body: serde_json::Value) -> RemotingResult<serde_json::Value> {
        let action: ManagerAction = serde_json::from_value(body)
            .map_err(|e| RemotingError::Protocol(format!("invalid manager action: {}", e)))?;
        debug!("Manager action received: {:?}", action);

        let reply = match action {
            ManagerAction::LoadModule(request) => serde_json::to_value(
                self.load_module_async(&request.location, None, request.respect_loading_mode)
                    .await?,
            )?,
            ManagerAction::LoadModuleDir(request) => serde_json::to_value(
                self.load_module_dir_async(
                    Path::new(&request.location),
                    None,
                    request.respect_loading_mode,
                )
                .await?,
            )?,
        };
        Ok(reply)
    }

    pub fn host_version(&self) -> &str {
        &self.inner.host_version
    }

    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.inner.catalog
    }

    /// Every module registered so far, in load order
    pub fn loaded_modules(&self) -> Vec<ModuleLoadingInfo> {
        read(&self.inner.loaded_modules).clone()
    }

    /// Host names in the order the hosts were added
    pub fn host_names(&self) -> Vec<String> {
        lock(&self.inner.hosts)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn has_parent(&self) -> bool {
        read(&self.inner.parent).is_some()
    }

    /// Replace the loading policy; `None` restores the default
    pub fn set_module_loading_policy(&self, policy: Option<Arc<dyn ModuleLoadingPolicy>>) {
        *write(&self.inner.policy) = policy.unwrap_or_else(|| Arc::new(DefaultModuleLoadingPolicy));
    }

    /// Install or clear the host version mismatch handler
    pub fn on_host_version_mismatch(&self, handler: Option<HostVersionMismatchHandler>) {
        *write(&self.inner.mismatch_handler) = handler;
    }

    pub fn register(&self, component: ComponentInfo) -> Result<(), ModuleError> {
        self.register_components(vec![component])
    }

    /// Register components as one batch; nothing is registered when any
    /// name is blank or already taken.
    pub fn register_components(&self, components: Vec<ComponentInfo>) -> Result<(), ModuleError> {
        let mut entries = Vec::with_capacity(components.len());
        for component in components {
            if component.name.trim().is_empty() {
                return Err(ModuleError::InvalidArgument(
                    "component name must be provided (non-empty/whitespaces)".to_string(),
                ));
            }
            let descriptor = dedication(component.descriptor, component.deps, self.dependency_lookup());
            let descriptor = if component.singleton {
                lazy_singleton(descriptor)
            } else {
                descriptor
            };
            debug!("Registering component {} ({})", component.name, component.version);
            entries.push((component.name, descriptor));
        }
        self.inner.container.set_all(entries)
    }

    fn dependency_lookup(&self) -> DependencyLookup {
        let weak = self.downgrade();
        Arc::new(move |name: String| {
            let weak = weak.clone();
            Box::pin(async move {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| ModuleError::OperationError("module manager is gone".to_string()))?;
                ModuleManager { inner }.get_component_async(&name, Vec::new()).await
            })
        })
    }

    /// Resolve a component locally, then through hosts, then through the parent
    pub async fn get_component_async(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, ModuleError> {
        self.resolve_component(name, args, &Origin::Local).await
    }

    async fn resolve_component(
        &self,
        name: &str,
        args: Vec<Value>,
        origin: &Origin,
    ) -> Result<Option<Value>, ModuleError> {
        if let Some(pending) = self.inner.container.get_dep(name, args.clone()) {
            return pending.await.map(Some);
        }

        let hosts: Vec<(String, ObjectRemotingProxy)> = lock(&self.inner.hosts)
            .iter()
            .filter(|(host_name, _)| *origin != Origin::Host(host_name.to_string()))
            .map(|(host_name, host)| (host_name.clone(), host.proxy.clone()))
            .collect();
        for (host_name, proxy) in hosts {
            let answer = proxy.request_async(name, args.clone()).await?;
            if !answer.is_empty() {
                debug!("Component {} resolved by host {}", name, host_name);
                return Ok(Some(answer));
            }
        }

        if *origin != Origin::Parent {
            let parent = read(&self.inner.parent).clone();
            if let Some(parent) = parent {
                let answer = parent.request_async(name, args).await?;
                if !answer.is_empty() {
                    debug!("Component {} resolved by parent host", name);
                    return Ok(Some(answer));
                }
            }
        }

        Ok(None)
    }

    /// Add a host: spawn a child host process when `communicator` is `None`,
    /// otherwise use the given link. Returns the proxy talking to the host.
    pub async fn new_host_async(
        &self,
        host_name: &str,
        communicator: Option<Communicator>,
    ) -> Result<ObjectRemotingProxy, ModuleError> {
        if host_name.trim().is_empty() {
            return Err(ModuleError::InvalidArgument(
                "host name must be provided (non-empty/whitespaces)".to_string(),
            ));
        }
        if self.host_proxy(host_name).is_some() {
            return Err(ModuleError::DuplicateHost(host_name.to_string()));
        }

        let (communicator, process, own_communicator) = match communicator {
            Some(communicator) => (communicator, None, false),
            None => {
                let spawner = match &self.inner.host_executable {
                    Some(executable) => HostProcessSpawner::new(executable),
                    None => HostProcessSpawner::current_exe()?,
                };
                let options = serde_json::to_string(&self.generate_constructor_options())?;
                let (process, raw) = spawner.spawn(host_name, &options)?;
                let communicator = Communicator::from_channel(
                    raw,
                    CommunicatorOptions::with_id(host_name)
                        .timeout(self.inner.request_timeout)
                        .max_message_length(self.inner.max_message_length),
                )?;
                (communicator, Some(process), true)
            }
        };

        let proxy = ObjectRemotingProxy::create(
            RoutePattern::exact(OBJECT_PROXY_PATTERN),
            communicator,
            own_communicator,
            Some(format!("host:{}", host_name)),
        )?;
        self.install_resolver(&proxy, Origin::Host(host_name.to_string()));

        let duplicate = {
            let mut hosts = lock(&self.inner.hosts);
            if hosts.iter().any(|(name, _)| name == host_name) {
                true
            } else {
                hosts.push((
                    host_name.to_string(),
                    Host {
                        proxy: proxy.clone(),
                        process,
                    },
                ));
                false
            }
        };
        if duplicate {
            log_error_async(|| proxy.dispose(), "Failed to dispose duplicate host proxy").await;
            return Err(ModuleError::DuplicateHost(host_name.to_string()));
        }

        info!("Host {} added", host_name);
        Ok(proxy)
    }

    /// Dispose the host's proxy, stop its process and forget it
    pub async fn destroy_host_async(&self, host_name: &str) -> Result<(), ModuleError> {
        let removed = {
            let mut hosts = lock(&self.inner.hosts);
            let index = hosts.iter().position(|(name, _)| name == host_name);
            index.map(|index| hosts.remove(index).1)
        };
        let host = removed
            .ok_or_else(|| ModuleError::InvalidArgument(format!("Host \"{}\" doesn't exist.", host_name)))?;

        log_error_async(|| host.proxy.dispose(), "Failed to dispose host proxy").await;
        if let Some(mut process) = host.process {
            process.terminate().await?;
        }
        info!("Host {} destroyed", host_name);
        Ok(())
    }

    fn host_proxy(&self, host_name: &str) -> Option<ObjectRemotingProxy> {
        lock(&self.inner.hosts)
            .iter()
            .find(|(name, _)| name == host_name)
            .map(|(_, host)| host.proxy.clone())
    }

    /// Send a manager action to `host_name`, spawning the host if needed
    async fn send_action(
        &self,
        host_name: &str,
        action: ManagerAction,
    ) -> Result<serde_json::Value, ModuleError> {
        let proxy = match self.host_proxy(host_name) {
            Some(proxy) => proxy,
            None => self.new_host_async(host_name, None).await?,
        };
        let body = serde_json::to_value(action)?;
        Ok(proxy.communicator().send_async(MODULE_MANAGER_PATTERN, body).await?)
    }

    /// Load one module unit, here or in the host named `host_name`.
    ///
    /// `location` is a unit path or `builtin:<name>`. Returns `None` when the
    /// policy declined the unit or it was skipped for its loading mode.
    pub async fn load_module_async(
        &self,
        location: &str,
        host_name: Option<&str>,
        respect_loading_mode: bool,
    ) -> Result<Option<ModuleLoadingInfo>, ModuleError> {
        if let Some(host_name) = host_name {
            let reply = self
                .send_action(
                    host_name,
                    ManagerAction::LoadModule(LoadRequest {
                        location: location.to_string(),
                        respect_loading_mode,
                    }),
                )
                .await?;
            return Ok(serde_json::from_value(reply)?);
        }

        match self.internal_load(location, respect_loading_mode).await? {
            Some(loaded) => {
                self.initialize_module(&loaded).await?;
                Ok(Some(loaded.loading_info))
            }
            None => Ok(None),
        }
    }

    /// Load every unit directly inside `dir`. All units register their
    /// components before any of them is initialized.
    pub async fn load_module_dir_async(
        &self,
        dir: &Path,
        host_name: Option<&str>,
        respect_loading_mode: bool,
    ) -> Result<Vec<ModuleLoadingInfo>, ModuleError> {
        if let Some(host_name) = host_name {
            let reply = self
                .send_action(
                    host_name,
                    ManagerAction::LoadModuleDir(LoadRequest {
                        location: dir.to_string_lossy().into_owned(),
                        respect_loading_mode,
                    }),
                )
                .await?;
            return Ok(serde_json::from_value(reply)?);
        }

        let mut loaded = Vec::new();
        for unit in list_units(dir)? {
            if let Some(module) = self
                .internal_load(&unit.to_string_lossy(), respect_loading_mode)
                .await?
            {
                loaded.push(module);
            }
        }

        for module in &loaded {
            self.initialize_module(module).await?;
        }
        info!("Loaded {} modules from {:?}", loaded.len(), dir);
        Ok(loaded.into_iter().map(|m| m.loading_info).collect())
    }

    async fn initialize_module(&self, loaded: &LoadedModule) -> Result<(), ModuleError> {
        loaded.module.initialize(self).await.map_err(|e| {
            error!("Module {} failed to initialize: {}", loaded.loading_info.info.name, e);
            e
        })
    }

    async fn should_load(&self, candidate: ModuleCandidate<'_>) -> bool {
        let policy = Arc::clone(&*read(&self.inner.policy));
        policy.should_load(self, candidate).await
    }

    /// Registration phase of one unit
    async fn internal_load(
        &self,
        location: &str,
        respect_loading_mode: bool,
    ) -> Result<Option<LoadedModule>, ModuleError> {
        let (name, manifest) = match location.strip_prefix(BUILTIN_PREFIX) {
            Some(builtin) => (builtin.to_string(), None),
            None => {
                let discovered = discover_module(Path::new(location))?;
                (discovered.manifest.name.clone(), Some(discovered.manifest))
            }
        };

        if !self.should_load(ModuleCandidate::Name(&name)).await {
            debug!("Loading policy declined module {}", name);
            return Ok(None);
        }

        let entry_point = manifest
            .as_ref()
            .map(|m| m.entry_point.as_str())
            .unwrap_or(location);
        let module = self.inner.catalog.instantiate(entry_point)?;
        let mut components = ComponentCollection::new();
        let mut info = module.get_module_metadata(&mut components)?;
        if let Some(manifest) = &manifest {
            if info.host_version.is_none() {
                info.host_version = manifest.host_version.clone();
            }
            if manifest.loading_mode == LoadingMode::Always {
                info.loading_mode = LoadingMode::Always;
            }
        }

        if !self.should_load(ModuleCandidate::Info(&info)).await {
            debug!("Loading policy declined module {} {}", info.name, info.version);
            return Ok(None);
        }

        if respect_loading_mode && info.loading_mode != LoadingMode::Always {
            debug!("Skipping on-demand module {}", info.name);
            return Ok(None);
        }

        self.check_host_version(&info)?;
        self.register_components(components.into_components())?;

        let loading_info = ModuleLoadingInfo {
            location: location.to_string(),
            info,
        };
        write(&self.inner.loaded_modules).push(loading_info.clone());
        info!(
            "Module {} {} loaded from {}",
            loading_info.info.name, loading_info.info.version, location
        );
        Ok(Some(LoadedModule {
            loading_info,
            module,
        }))
    }

    fn check_host_version(&self, info: &ModuleInfo) -> Result<(), ModuleError> {
        let required = match &info.host_version {
            Some(required) => required,
            None => return Ok(()),
        };
        if Version::parse(required)? <= self.inner.version {
            return Ok(());
        }

        let handler = read(&self.inner.mismatch_handler).clone();
        let accepted = handler
            .map(|handler| handler(info, required, &self.inner.host_version))
            .unwrap_or(false);
        if accepted {
            warn!(
                "Module {} requires host {} (running {}), accepted by mismatch handler",
                info.name, required, self.inner.host_version
            );
            return Ok(());
        }
        Err(ModuleError::VersionIncompatible(format!(
            "module \"{}\" requires host version {} but this host is {}",
            info.name, required, self.inner.host_version
        )))
    }

    /// Options for a new host: the host version and every module loaded
    /// with loading mode `Always`
    pub fn generate_constructor_options(&self) -> ConstructorOptions {
        ConstructorOptions {
            host_version: self.inner.host_version.clone(),
            initial_modules: read(&self.inner.loaded_modules)
                .iter()
                .filter(|m| m.info.loading_mode == LoadingMode::Always)
                .cloned()
                .collect(),
        }
    }

    /// Destroy every host and disconnect from the parent
    pub async fn shutdown(&self) {
        for host_name in self.host_names() {
            log_error_async(|| self.destroy_host_async(&host_name), "Failed to destroy host").await;
        }

        let parent = write(&self.inner.parent).take();
        if let Some(parent) = parent {
            if !parent.communicator().is_disposed() {
                if let Err(e) = parent
                    .communicator()
                    .unmap(&RoutePattern::exact(MODULE_MANAGER_PATTERN))
                {
                    warn!("Failed to unmap manager route: {}", e);
                }
            }
            log_error_async(|| parent.dispose(), "Failed to dispose parent proxy").await;
        }
        info!("Module manager shut down");
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("host_version", &self.inner.host_version)
            .field("hosts", &self.host_names())
            .finish()
    }
}

/// The manager as seen by components that declare a `module-manager`
/// dependency
pub struct ModuleManagerObject {
    manager: Weak<ManagerInner>,
}

impl ModuleManagerObject {
    pub fn manager(&self) -> Option<ModuleManager> {
        self.manager.upgrade().map(|inner| ModuleManager { inner })
    }

    fn get_component_function(&self) -> Value {
        let manager = self.manager.clone();
        Value::object(FunctionObject::new("getComponentAsync", move |args| {
            let manager = manager.clone();
            async move {
                let inner = manager
                    .upgrade()
                    .ok_or_else(|| RemotingError::Disposed("ModuleManager".to_string()))?;
                let mut args = args.into_iter();
                let name = args
                    .next()
                    .and_then(|name| name.as_str().map(str::to_string))
                    .ok_or_else(|| RemotingError::InvalidArgument("component name expected".to_string()))?;
                let found = ModuleManager { inner }
                    .get_component_async(&name, args.collect())
                    .await?;
                Ok(found.unwrap_or_default())
            }
        }))
    }
}

#[async_trait::async_trait]
impl RemoteObject for ModuleManagerObject {
    fn members(&self) -> Vec<(String, Value)> {
        vec![("getComponentAsync".to_string(), self.get_component_function())]
    }

    async fn get_member(&self, name: &str) -> RemotingResult<Value> {
        let manager = match self.manager() {
            Some(manager) => manager,
            None => return Err(RemotingError::Disposed("ModuleManager".to_string())),
        };
        Ok(match name {
            "hostVersion" => Value::String(manager.host_version().to_string()),
            "getComponentAsync" => self.get_component_function(),
            _ => Value::Undefined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Versioned(Option<&'static str>);

    #[async_trait]
    impl Module for Versioned {
        fn get_module_metadata(&self, components: &mut ComponentCollection) -> Result<ModuleInfo, ModuleError> {
            components.register(ComponentInfo::new("versioned.svc", "1.0.0", |_| async {
                Ok(Value::from("ok"))
            }))?;
            let info = ModuleInfo::new("versioned", "1.0.0");
            Ok(match self.0 {
                Some(version) => info.host_version(version),
                None => info,
            })
        }
    }

    fn manager_with(module: fn() -> Versioned) -> ModuleManager {
        let catalog = ModuleCatalog::new();
        catalog.register("versioned", module);
        ModuleManager::with_options(ModuleManagerOptions::new("1.0.0").catalog(Arc::new(catalog))).unwrap()
    }

    #[test]
    fn test_invalid_host_version_rejected() {
        for version in ["not-a-version", "1.0", "v1.0.0", "1.0.0.0"] {
            assert!(
                matches!(ModuleManager::new(version, None), Err(ModuleError::InvalidVersion(_))),
                "{} should be rejected",
                version
            );
        }
    }

    #[tokio::test]
    async fn test_manager_registers_itself() {
        let manager = ModuleManager::new("1.2.3", None).unwrap();
        let object = manager
            .get_component_async(MODULE_MANAGER_COMPONENT, vec![])
            .await
            .unwrap()
            .unwrap();
        let manager_object = object.downcast_ref::<ModuleManagerObject>().unwrap();
        assert_eq!(manager_object.manager().unwrap().host_version(), "1.2.3");
        assert_eq!(
            manager_object.get_member("hostVersion").await.unwrap(),
            Value::from("1.2.3")
        );
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let manager = ModuleManager::new("1.0.0", None).unwrap();
        let component = || ComponentInfo::new("svc", "1.0.0", |_| async { Ok(Value::Null) });
        manager.register(component()).unwrap();
        assert!(matches!(
            manager.register(component()),
            Err(ModuleError::DuplicateComponent(_))
        ));
        assert!(manager.get_component_async("missing", vec![]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deps_resolved_positionally() {
        let manager = ModuleManager::new("1.0.0", None).unwrap();
        manager
            .register(ComponentInfo::new("greeting", "1.0.0", |_| async { Ok(Value::from("hello")) }))
            .unwrap();
        manager
            .register(
                ComponentInfo::new("greeter", "1.0.0", |args: Vec<Value>| async move {
                    let greeting = args[0].as_str().unwrap_or_default().to_string();
                    let name = args.get(1).and_then(Value::as_str).unwrap_or("nobody").to_string();
                    Ok(Value::String(format!("{}, {}", greeting, name)))
                })
                .deps(&["greeting"]),
            )
            .unwrap();

        let value = manager
            .get_component_async("greeter", vec![Value::from("world")])
            .await
            .unwrap();
        assert_eq!(value, Some(Value::from("hello, world")));
    }

    #[tokio::test]
    async fn test_version_gate() {
        let manager = manager_with(|| Versioned(Some("2.0.0")));
        let err = manager
            .load_module_async("builtin:versioned", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::VersionIncompatible(_)));
        assert!(manager.loaded_modules().is_empty());

        manager.on_host_version_mismatch(Some(Arc::new(
            |_: &ModuleInfo, required: &str, actual: &str| required == "2.0.0" && actual == "1.0.0",
        )));
        let loaded = manager
            .load_module_async("builtin:versioned", None, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.location, "builtin:versioned");
        assert_eq!(
            manager.get_component_async("versioned.svc", vec![]).await.unwrap(),
            Some(Value::from("ok"))
        );
    }

    #[tokio::test]
    async fn test_respect_loading_mode_skips_on_demand() {
        let manager = manager_with(|| Versioned(None));
        let skipped = manager
            .load_module_async("builtin:versioned", None, true)
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert!(!manager.loaded_modules().iter().any(|m| m.info.name == "versioned"));
    }

    #[tokio::test]
    async fn test_constructor_options_hold_always_modules() {
        let manager = ModuleManager::new("1.0.0", None).unwrap();
        manager.load_module_async("builtin:ipc", None, false).await.unwrap();
        let options = manager.generate_constructor_options();
        assert_eq!(options.host_version, "1.0.0");
        assert_eq!(options.initial_modules.len(), 1);
        assert_eq!(options.initial_modules[0].location, "builtin:ipc");

        let json = serde_json::to_value(&options).unwrap();
        assert!(json.get("initialModules").is_some());
        assert!(json.get("hostVersion").is_some());
    }

    #[tokio::test]
    async fn test_host_names_validated() {
        let manager = ModuleManager::new("1.0.0", None).unwrap();
        assert!(matches!(
            manager.new_host_async(" ", None).await,
            Err(ModuleError::InvalidArgument(_))
        ));
        assert!(manager.destroy_host_async("ghost").await.is_err());
    }
}
