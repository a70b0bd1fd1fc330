//! Local stand-ins for remote objects and functions
//!
//! Members captured in the snapshot answer locally; everything else is
//! forwarded through the owning manager's delegation and the result realized
//! under the mirror's own reference id.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::debug;

use crate::error::{RemotingError, Result};
use crate::remoting::data_info::RefId;
use crate::remoting::manager::WeakDataInfoManager;
use crate::remoting::value::{RemoteObject, Value};
use crate::utils::lock::{read, write};

/// Name of the remote dispose hook chained by [`ObjectMirror::dispose`]
pub const DISPOSE_MEMBER: &str = "disposeAsync";

async fn release(
    manager: &WeakDataInfoManager,
    ref_id: &str,
    parent_id: Option<&str>,
) -> Result<()> {
    match manager.upgrade() {
        Ok(manager) => match manager.release_by_id(ref_id, parent_id, false).await {
            Err(RemotingError::Disposed(_)) => Ok(()),
            other => other,
        },
        // Nothing is tracked anymore.
        Err(_) => Ok(()),
    }
}

pub struct ObjectMirror {
    ref_id: RefId,
    parent_id: Option<RefId>,
    members: RwLock<BTreeMap<String, Value>>,
    manager: WeakDataInfoManager,
    disposed: AtomicBool,
}

impl ObjectMirror {
    pub(crate) fn new(ref_id: RefId, parent_id: Option<RefId>, manager: WeakDataInfoManager) -> Self {
        Self {
            ref_id,
            parent_id,
            members: RwLock::new(BTreeMap::new()),
            manager,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub(crate) fn set_members(&self, members: BTreeMap<String, Value>) {
        *write(&self.members) = members;
    }
}

#[async_trait]
impl RemoteObject for ObjectMirror {
    fn members(&self) -> Vec<(String, Value)> {
        read(&self.members)
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    async fn get_member(&self, name: &str) -> Result<Value> {
        if let Some(value) = read(&self.members).get(name).cloned() {
            return Ok(value);
        }
        let manager = self.manager.upgrade()?;
        let info = manager.delegation().get_property(&self.ref_id, name).await?;
        manager.realize_data_info(&info, Some(&self.ref_id))
    }

    async fn set_member(&self, name: &str, value: Value) -> Result<bool> {
        // Snapshot members are read-only
        if read(&self.members).contains_key(name) {
            return Ok(false);
        }
        let manager = self.manager.upgrade()?;
        let info = manager.to_data_info(&value, Some(&self.ref_id))?;
        manager
            .delegation()
            .set_property(&self.ref_id, name, info)
            .await
    }

    async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let chained = read(&self.members).get(DISPOSE_MEMBER).cloned();
        if let Some(Value::Object(hook)) = chained {
            if hook.is_callable() {
                debug!("Invoking remote dispose hook of {}", self.ref_id);
                hook.invoke(Value::Undefined, Vec::new()).await?;
            }
        }
        release(&self.manager, &self.ref_id, self.parent_id.as_deref()).await
    }
}

pub struct FunctionMirror {
    ref_id: RefId,
    parent_id: Option<RefId>,
    manager: WeakDataInfoManager,
    disposed: AtomicBool,
}

impl FunctionMirror {
    pub(crate) fn new(ref_id: RefId, parent_id: Option<RefId>, manager: WeakDataInfoManager) -> Self {
        Self {
            ref_id,
            parent_id,
            manager,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }
}

#[async_trait]
impl RemoteObject for FunctionMirror {
    fn is_callable(&self) -> bool {
        true
    }

    async fn invoke(&self, this: Value, args: Vec<Value>) -> Result<Value> {
        let manager = self.manager.upgrade()?;
        let this_info = manager.to_data_info(&this, Some(&self.ref_id))?;
        let arg_infos = args
            .iter()
            .map(|arg| manager.to_data_info(arg, Some(&self.ref_id)))
            .collect::<Result<Vec<_>>>()?;
        let result = manager
            .delegation()
            .apply(&self.ref_id, this_info, arg_infos)
            .await?;
        manager.realize_data_info(&result, Some(&self.ref_id))
    }

    async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        release(&self.manager, &self.ref_id, self.parent_id.as_deref()).await
    }
}
