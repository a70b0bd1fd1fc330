//! Built-in modules
//!
//! - `ipc`: `ipc.communicator(channel, options?)`
//! - `remoting`: `remoting.pattern.string(raw)`, `remoting.pattern.regex(raw)`
//! - `proxy.object`: `remoting.proxy(pattern?, communicator, ownCommunicator?)`
//!
//! All three load in every host.

use async_trait::async_trait;
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::Result as RemotingResult;
use crate::ipc::channel::RawChannel;
use crate::ipc::communicator::{Communicator, CommunicatorOptions};
use crate::ipc::pattern::RoutePattern;
use crate::module::collection::ComponentCollection;
use crate::module::manager::{ModuleManagerObject, MODULE_MANAGER_COMPONENT};
use crate::module::registry::catalog::ModuleFactory;
use crate::module::traits::{ComponentInfo, LoadingMode, Module, ModuleError, ModuleInfo};
use crate::remoting::proxy::ObjectRemotingProxy;
use crate::remoting::value::{RemoteObject, Value};
use crate::utils::lock::lock;

/// Pattern used by `remoting.proxy` when none is given
pub const DEFAULT_PROXY_PATTERN: &str = "proxy.object";

const BUILTIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Catalog entries of the built-in modules
pub fn factories() -> Vec<(&'static str, ModuleFactory)> {
    vec![
        ("ipc", Arc::new(|| Arc::new(IpcModule) as Arc<dyn Module>) as ModuleFactory),
        ("remoting", Arc::new(|| Arc::new(RemotingModule) as Arc<dyn Module>)),
        ("proxy.object", Arc::new(|| Arc::new(ProxyObjectModule) as Arc<dyn Module>)),
    ]
}

fn builtin_info(name: &str) -> ModuleInfo {
    ModuleInfo::new(name, BUILTIN_VERSION).loading_mode(LoadingMode::Always)
}

fn arg<'a, T: Any>(args: &'a [Value], index: usize, what: &str) -> Result<&'a T, ModuleError> {
    args.get(index)
        .and_then(|value| value.downcast_ref::<T>())
        .ok_or_else(|| ModuleError::InvalidArgument(format!("argument {} must be {}", index, what)))
}

/// Raw transport wrapped so it can be passed as a component argument.
/// The channel can be taken once.
pub struct ChannelHandle {
    kind: &'static str,
    raw: Mutex<Option<RawChannel>>,
}

impl ChannelHandle {
    pub fn new(raw: RawChannel) -> Self {
        Self {
            kind: raw.kind(),
            raw: Mutex::new(Some(raw)),
        }
    }

    pub fn take(&self) -> Option<RawChannel> {
        lock(&self.raw).take()
    }
}

#[async_trait]
impl RemoteObject for ChannelHandle {
    async fn get_member(&self, name: &str) -> RemotingResult<Value> {
        Ok(match name {
            "kind" => Value::from(self.kind),
            _ => Value::Undefined,
        })
    }
}

#[async_trait]
impl RemoteObject for Communicator {
    async fn get_member(&self, name: &str) -> RemotingResult<Value> {
        Ok(match name {
            "id" => Value::from(self.id()),
            "disposed" => Value::from(self.is_disposed()),
            _ => Value::Undefined,
        })
    }

    async fn dispose(&self) -> RemotingResult<()> {
        Communicator::dispose(self).await;
        Ok(())
    }
}

#[async_trait]
impl RemoteObject for RoutePattern {
    async fn get_member(&self, name: &str) -> RemotingResult<Value> {
        Ok(match name {
            "raw" => Value::from(self.raw()),
            "kind" => Value::from(match self {
                RoutePattern::Exact(_) => "string",
                RoutePattern::Regex(_) => "regex",
            }),
            _ => Value::Undefined,
        })
    }
}

/// `{id?: string, timeout?: ms, maxMessageLength?: bytes}`
fn communicator_options(value: Option<&Value>) -> CommunicatorOptions {
    let mut options = CommunicatorOptions::default();
    if let Some(json) = value.and_then(Value::to_json) {
        options.id = json.get("id").and_then(|id| id.as_str()).map(str::to_string);
        options.timeout = json
            .get("timeout")
            .and_then(|timeout| timeout.as_u64())
            .map(Duration::from_millis);
        options.max_message_length = json
            .get("maxMessageLength")
            .and_then(|length| length.as_u64())
            .and_then(|length| usize::try_from(length).ok());
    }
    options
}

pub struct IpcModule;

#[async_trait]
impl Module for IpcModule {
    fn get_module_metadata(&self, components: &mut ComponentCollection) -> Result<ModuleInfo, ModuleError> {
        components.register(ComponentInfo::new(
            "ipc.communicator",
            BUILTIN_VERSION,
            |args: Vec<Value>| async move {
                let raw = arg::<ChannelHandle>(&args, 0, "a channel")?
                    .take()
                    .ok_or_else(|| ModuleError::InvalidArgument("channel was already used".to_string()))?;
                let communicator = Communicator::from_channel(raw, communicator_options(args.get(1)))?;
                Ok(Value::object(communicator))
            },
        ))?;
        Ok(builtin_info("ipc"))
    }
}

pub struct RemotingModule;

#[async_trait]
impl Module for RemotingModule {
    fn get_module_metadata(&self, components: &mut ComponentCollection) -> Result<ModuleInfo, ModuleError> {
        components
            .register(ComponentInfo::new(
                "remoting.pattern.string",
                BUILTIN_VERSION,
                |args: Vec<Value>| async move {
                    let raw = args
                        .first()
                        .and_then(Value::as_str)
                        .ok_or_else(|| ModuleError::InvalidArgument("pattern must be a string".to_string()))?;
                    Ok(Value::object(RoutePattern::exact(raw)))
                },
            ))?
            .register(ComponentInfo::new(
                "remoting.pattern.regex",
                BUILTIN_VERSION,
                |args: Vec<Value>| async move {
                    let raw = args
                        .first()
                        .and_then(Value::as_str)
                        .ok_or_else(|| ModuleError::InvalidArgument("pattern must be a string".to_string()))?;
                    Ok(Value::object(RoutePattern::regex(raw)?))
                },
            ))?;
        Ok(builtin_info("remoting"))
    }
}

pub struct ProxyObjectModule;

#[async_trait]
impl Module for ProxyObjectModule {
    fn get_module_metadata(&self, components: &mut ComponentCollection) -> Result<ModuleInfo, ModuleError> {
        components.register(
            ComponentInfo::new("remoting.proxy", BUILTIN_VERSION, |args: Vec<Value>| async move {
                let manager = arg::<ModuleManagerObject>(&args, 0, "the module manager")?.manager();
                let pattern = match args.get(1) {
                    None => RoutePattern::exact(DEFAULT_PROXY_PATTERN),
                    Some(value) if value.is_empty() => RoutePattern::exact(DEFAULT_PROXY_PATTERN),
                    Some(value) => match value.as_str() {
                        Some(raw) => RoutePattern::exact(raw),
                        None => arg::<RoutePattern>(&args, 1, "a route pattern")?.clone(),
                    },
                };
                let communicator = arg::<Communicator>(&args, 2, "a communicator")?.clone();
                let own_communicator = args.get(3).and_then(Value::as_bool).unwrap_or(false);

                let proxy = ObjectRemotingProxy::create(pattern, communicator, own_communicator, None)?;
                if let Some(manager) = manager {
                    proxy.set_resolver_fn(move |_proxy, name, args| {
                        let manager = manager.clone();
                        async move {
                            let found = manager.get_component_async(&name, args).await?;
                            Ok(found.unwrap_or_default())
                        }
                    });
                }
                Ok(Value::object(proxy))
            })
            .deps(&[MODULE_MANAGER_COMPONENT]),
        )?;
        Ok(builtin_info("proxy.object"))
    }
}
