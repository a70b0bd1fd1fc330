//! Object remoting proxy
//!
//! Exposes named-resource lookup and live-object delegation over one
//! communicator route, backed by its own [`DataInfoManager`]. Each side of a
//! connection runs one proxy on the same route; requests from the peer are
//! answered through the pluggable resolver.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RemotingError, Result};
use crate::ipc::communicator::Communicator;
use crate::ipc::pattern::RoutePattern;
use crate::remoting::data_info::{DataInfo, RefId};
use crate::remoting::delegate::{
    parse_delegation_type, ApplyContent, CommunicatorDelegation, DelegationType, DisposeContent,
    GetPropertyContent, ProxyMessage, SetPropertyContent,
};
use crate::remoting::manager::DataInfoManager;
use crate::remoting::value::{ObjectRef, RemoteObject, Value};
use crate::utils::error::log_error_async;
use crate::utils::lock::{read, write};

/// Resolves a requested resource name: `(proxy, name, args) -> value`.
/// `Value::Undefined` means "no resource".
pub type Resolver = Arc<
    dyn Fn(ObjectRemotingProxy, String, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync,
>;

/// Callable placeholder keeping request arguments alive for one round trip
struct Anchor;

impl RemoteObject for Anchor {
    fn is_callable(&self) -> bool {
        true
    }
}

struct ProxyInner {
    id: String,
    pattern: RoutePattern,
    communicator: Communicator,
    own_communicator: bool,
    data_info_manager: DataInfoManager,
    resolver: RwLock<Option<Resolver>>,
    disposed: AtomicBool,
}

#[derive(Clone)]
pub struct ObjectRemotingProxy {
    inner: Arc<ProxyInner>,
}

impl ObjectRemotingProxy {
    /// Create a proxy serving `pattern` on `communicator`.
    ///
    /// The raw form of `pattern` is also the path outbound requests are sent
    /// to. When `own_communicator` is set, disposing the proxy disposes the
    /// communicator. `proxy_id` defaults to a fresh UUID.
    pub fn create(
        pattern: RoutePattern,
        communicator: Communicator,
        own_communicator: bool,
        proxy_id: Option<String>,
    ) -> Result<Self> {
        let delegation = Arc::new(CommunicatorDelegation::new(
            communicator.clone(),
            pattern.raw(),
        ));
        let inner = Arc::new(ProxyInner {
            id: proxy_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            pattern: pattern.clone(),
            communicator: communicator.clone(),
            own_communicator,
            data_info_manager: DataInfoManager::new(delegation),
            resolver: RwLock::new(None),
            disposed: AtomicBool::new(false),
        });

        let weak: Weak<ProxyInner> = Arc::downgrade(&inner);
        communicator.map(pattern, move |_, _, body| {
            let weak = weak.clone();
            async move {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| RemotingError::Disposed("ObjectRemotingProxy".to_string()))?;
                ObjectRemotingProxy { inner }.on_message(body).await
            }
        })?;

        debug!("Object remoting proxy {} created on {}", inner.id, inner.pattern);
        Ok(Self { inner })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn communicator(&self) -> &Communicator {
        &self.inner.communicator
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.inner.pattern
    }

    pub fn data_info_manager(&self) -> &DataInfoManager {
        &self.inner.data_info_manager
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn validate(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(RemotingError::Disposed(format!(
                "ObjectRemotingProxy ({})",
                self.inner.id
            )));
        }
        Ok(())
    }

    pub fn resolver(&self) -> Option<Resolver> {
        read(&self.inner.resolver).clone()
    }

    /// Install or clear the resolver answering the peer's resource requests
    pub fn set_resolver(&self, resolver: Option<Resolver>) {
        *write(&self.inner.resolver) = resolver;
    }

    pub fn set_resolver_fn<F, Fut>(&self, resolver: F)
    where
        F: Fn(ObjectRemotingProxy, String, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.set_resolver(Some(Arc::new(move |proxy, name, args| {
            Box::pin(resolver(proxy, name, args))
        })));
    }

    fn new_anchor(&self) -> Result<RefId> {
        let anchor: ObjectRef = Arc::new(Anchor);
        let info = self
            .inner
            .data_info_manager
            .to_data_info(&Value::Object(anchor), None)?;
        info.id
            .ok_or_else(|| RemotingError::Protocol("anchor was not reference-tracked".to_string()))
    }

    async fn release_anchor(&self, anchor_id: &str) {
        log_error_async(
            || self.inner.data_info_manager.release_by_id(anchor_id, None, true),
            "Failed to release request anchor",
        )
        .await;
    }

    /// Link a reference-tracked result as a referer of every tracked argument
    fn link_arguments(&self, result: &DataInfo, args: &[DataInfo]) -> Result<()> {
        if let Some(result_id) = &result.id {
            for arg_id in args.iter().filter_map(|arg| arg.id.as_ref()) {
                self.inner
                    .data_info_manager
                    .add_reference_by_id(arg_id, Some(result_id))?;
            }
        }
        Ok(())
    }

    /// Request the named resource from the peer
    pub async fn request_async(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.validate()?;
        if name.trim().is_empty() {
            return Err(RemotingError::InvalidArgument(
                "resource name must be a non-empty string".to_string(),
            ));
        }

        let anchor_id = self.new_anchor()?;
        let result = self.request_with_anchor(name, &args, &anchor_id).await;
        self.release_anchor(&anchor_id).await;
        result
    }

    async fn request_with_anchor(&self, name: &str, args: &[Value], anchor_id: &str) -> Result<Value> {
        let manager = &self.inner.data_info_manager;
        let arg_infos = args
            .iter()
            .map(|arg| manager.to_data_info(arg, Some(anchor_id)))
            .collect::<Result<Vec<_>>>()?;

        let body = serde_json::to_value(ProxyMessage::RequestResource {
            resource_id: name.to_string(),
            extra_args: arg_infos.clone(),
        })?;
        let reply = self
            .inner
            .communicator
            .send_async(self.inner.pattern.raw(), body)
            .await?;

        let info: DataInfo = serde_json::from_value(reply)?;
        let target = manager.realize_data_info(&info, None)?;
        self.link_arguments(&info, &arg_infos)?;
        Ok(target)
    }

    async fn on_message(&self, body: serde_json::Value) -> Result<serde_json::Value> {
        self.validate()?;
        let message: ProxyMessage = serde_json::from_value(body)
            .map_err(|e| RemotingError::Protocol(format!("invalid proxy message: {}", e)))?;

        match message {
            ProxyMessage::RequestResource {
                resource_id,
                extra_args,
            } => {
                let info = self.on_request_resource(&resource_id, extra_args).await?;
                Ok(serde_json::to_value(info)?)
            }
            ProxyMessage::Delegate {
                delegate_type,
                content,
            } => self.on_delegate(parse_delegation_type(&delegate_type)?, content).await,
        }
    }

    async fn on_request_resource(&self, name: &str, extra_args: Vec<DataInfo>) -> Result<DataInfo> {
        let anchor_id = self.new_anchor()?;
        let result = self.resolve_with_anchor(name, &extra_args, &anchor_id).await;
        self.release_anchor(&anchor_id).await;
        result
    }

    async fn resolve_with_anchor(
        &self,
        name: &str,
        extra_args: &[DataInfo],
        anchor_id: &str,
    ) -> Result<DataInfo> {
        let manager = &self.inner.data_info_manager;
        let args = extra_args
            .iter()
            .map(|info| manager.realize_data_info(info, Some(anchor_id)))
            .collect::<Result<Vec<_>>>()?;

        let target = match self.resolver() {
            Some(resolver) => resolver(self.clone(), name.to_string(), args).await?,
            None => {
                debug!("Proxy {} has no resolver for \"{}\"", self.inner.id, name);
                Value::Undefined
            }
        };

        let info = manager.to_data_info(&target, None)?;
        self.link_arguments(&info, extra_args)?;
        Ok(info)
    }

    async fn on_delegate(
        &self,
        delegate_type: DelegationType,
        content: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let manager = &self.inner.data_info_manager;
        let target_of = |ref_id: &str| -> Result<ObjectRef> {
            manager
                .get(ref_id)?
                .ok_or_else(|| RemotingError::UnknownReference(ref_id.to_string()))
        };

        match delegate_type {
            DelegationType::Get => {
                let content: GetPropertyContent = serde_json::from_value(content)?;
                let target = target_of(&content.ref_id)?;
                let value = target.get_member(&content.property).await?;
                let info = manager.to_data_info(&value, Some(&content.ref_id))?;
                Ok(serde_json::to_value(info)?)
            }
            DelegationType::Set => {
                let content: SetPropertyContent = serde_json::from_value(content)?;
                let target = target_of(&content.ref_id)?;
                let value = manager.realize_data_info(&content.value, Some(&content.ref_id))?;
                let assigned = target.set_member(&content.property, value).await?;
                Ok(serde_json::Value::Bool(assigned))
            }
            DelegationType::Apply => {
                let content: ApplyContent = serde_json::from_value(content)?;
                let target = target_of(&content.ref_id)?;
                if !target.is_callable() {
                    return Err(RemotingError::NotCallable(content.ref_id));
                }
                let this = manager.realize_data_info(&content.this_arg, Some(&content.ref_id))?;
                let args = content
                    .args
                    .iter()
                    .map(|arg| manager.realize_data_info(arg, Some(&content.ref_id)))
                    .collect::<Result<Vec<_>>>()?;
                let result = target.invoke(this, args).await?;
                let info = manager.to_data_info(&result, Some(&content.ref_id))?;
                Ok(serde_json::to_value(info)?)
            }
            DelegationType::Dispose => {
                let content: DisposeContent = serde_json::from_value(content)?;
                manager
                    .release_by_id(&content.ref_id, content.parent_id.as_deref(), true)
                    .await?;
                Ok(serde_json::Value::Null)
            }
        }
    }

    /// Unmap the route, release every reference and, when owned, dispose the
    /// communicator. Repeated calls are no-ops.
    pub async fn dispose(&self) -> Result<()> {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if !self.inner.communicator.is_disposed() {
            if let Err(e) = self.inner.communicator.unmap(&self.inner.pattern) {
                warn!("Proxy {} failed to unmap its route: {}", self.inner.id, e);
            }
        }
        self.inner.data_info_manager.dispose().await?;

        if self.inner.own_communicator {
            self.inner.communicator.dispose().await;
        }
        debug!("Object remoting proxy {} disposed", self.inner.id);
        Ok(())
    }
}

#[async_trait]
impl RemoteObject for ObjectRemotingProxy {
    fn members(&self) -> Vec<(String, Value)> {
        vec![("id".to_string(), Value::String(self.inner.id.clone()))]
    }

    async fn get_member(&self, name: &str) -> Result<Value> {
        Ok(match name {
            "id" => Value::String(self.inner.id.clone()),
            _ => Value::Undefined,
        })
    }

    async fn dispose(&self) -> Result<()> {
        ObjectRemotingProxy::dispose(self).await
    }
}

impl std::fmt::Debug for ObjectRemotingProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRemotingProxy")
            .field("id", &self.inner.id)
            .field("pattern", &self.inner.pattern)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
