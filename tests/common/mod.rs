//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use remoting_host::ipc::channel::{window, RawChannel};
use remoting_host::ipc::{Communicator, CommunicatorOptions, RoutePattern};
use remoting_host::module::manager::{ModuleManager, ModuleManagerOptions, OBJECT_PROXY_PATTERN};
use remoting_host::module::ModuleCatalog;
use remoting_host::remoting::{DataInfo, Delegation, ObjectRemotingProxy};
use remoting_host::Result;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Two communicators joined by an in-process link
pub fn communicator_pair(timeout: Duration) -> (Communicator, Communicator) {
    let (a, b) = window::pair();
    let left = Communicator::from_channel(
        RawChannel::Window(a),
        CommunicatorOptions::with_id("left").timeout(timeout),
    )
    .unwrap();
    let right = Communicator::from_channel(
        RawChannel::Window(b),
        CommunicatorOptions::with_id("right").timeout(timeout),
    )
    .unwrap();
    (left, right)
}

/// Two proxies on the same route, one per side of a link
pub fn proxy_pair() -> (ObjectRemotingProxy, ObjectRemotingProxy) {
    let (left, right) = communicator_pair(Duration::from_secs(5));
    let pattern = RoutePattern::exact("/test/object-proxy");
    (
        ObjectRemotingProxy::create(pattern.clone(), left, true, Some("left".to_string())).unwrap(),
        ObjectRemotingProxy::create(pattern, right, true, Some("right".to_string())).unwrap(),
    )
}

/// Peer on the far end of a host link: a bare proxy answering through
/// `answer` and counting the requests it receives
pub struct HostPeer {
    pub proxy: ObjectRemotingProxy,
    pub requests: Arc<AtomicUsize>,
}

impl HostPeer {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Attach a [`HostPeer`] to `manager` under `host_name`
pub async fn attach_peer(
    manager: &ModuleManager,
    host_name: &str,
    answer: Option<(&'static str, &'static str)>,
) -> HostPeer {
    let (near, far) = communicator_pair(Duration::from_secs(5));
    manager.new_host_async(host_name, Some(near)).await.unwrap();

    let proxy = ObjectRemotingProxy::create(RoutePattern::exact(OBJECT_PROXY_PATTERN), far, true, None).unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    proxy.set_resolver_fn(move |_proxy, name, _args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let answer = match answer {
            Some((wanted, value)) if wanted == name => remoting_host::Value::from(value),
            _ => remoting_host::Value::Undefined,
        };
        async move { Ok(answer) }
    });
    HostPeer { proxy, requests }
}

/// Child manager connected to `parent` as host `host_name`
pub async fn attach_child_manager(
    parent: &ModuleManager,
    host_name: &str,
    catalog: Arc<ModuleCatalog>,
) -> ModuleManager {
    let (near, far) = communicator_pair(Duration::from_secs(5));
    parent.new_host_async(host_name, Some(near)).await.unwrap();
    ModuleManager::with_options(
        ModuleManagerOptions::new(parent.host_version())
            .parent(far)
            .catalog(catalog),
    )
    .unwrap()
}

/// Write a `module.toml` unit directory
pub fn write_unit_dir(dir: &Path, name: &str, entry_point: &str, host_version: Option<&str>) {
    let unit = dir.join(name);
    std::fs::create_dir_all(&unit).unwrap();
    std::fs::write(unit.join("module.toml"), manifest(name, entry_point, host_version)).unwrap();
}

/// Write a standalone `<name>.toml` unit
pub fn write_unit_file(dir: &Path, name: &str, entry_point: &str, host_version: Option<&str>) {
    std::fs::write(
        dir.join(format!("{}.toml", name)),
        manifest(name, entry_point, host_version),
    )
    .unwrap();
}

fn manifest(name: &str, entry_point: &str, host_version: Option<&str>) -> String {
    let mut text = format!(
        "name = \"{}\"\nversion = \"1.0.0\"\nentry_point = \"{}\"\n",
        name, entry_point
    );
    if let Some(host_version) = host_version {
        text.push_str(&format!("host_version = \"{}\"\n", host_version));
    }
    text
}

/// Delegation that records release notifications and answers nothing else
#[derive(Default)]
pub struct CountingDelegation {
    pub disposes: AtomicUsize,
}

#[async_trait]
impl Delegation for CountingDelegation {
    async fn get_property(&self, _ref_id: &str, _property: &str) -> Result<DataInfo> {
        Ok(DataInfo::undefined())
    }

    async fn set_property(&self, _ref_id: &str, _property: &str, _value: DataInfo) -> Result<bool> {
        Ok(false)
    }

    async fn apply(&self, _ref_id: &str, _this_arg: DataInfo, _args: Vec<DataInfo>) -> Result<DataInfo> {
        Ok(DataInfo::undefined())
    }

    async fn dispose(&self, _ref_id: &str, _parent_id: Option<&str>) -> Result<()> {
        self.disposes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
