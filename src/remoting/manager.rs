//! Data info manager: the distributed garbage collector
//!
//! Converts live values into [`DataInfo`] and back while maintaining the
//! [`ReferenceGraph`], so a value is released locally only once nothing on
//! either side still needs it. Releases initiated here notify the remote side
//! through a [`Delegation`] unless asked to stay local.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

use crate::error::{RemotingError, Result};
use crate::remoting::data_info::{DataInfo, DataType, RefId};
use crate::remoting::delegate::Delegation;
use crate::remoting::mirror::{FunctionMirror, ObjectMirror};
use crate::remoting::reference::ReferenceGraph;
use crate::remoting::value::{ObjectRef, Value};
use crate::utils::error::log_error_async;
use crate::utils::lock::lock;

pub(crate) struct ManagerInner {
    graph: Mutex<Option<ReferenceGraph>>,
    delegation: Arc<dyn Delegation>,
}

#[derive(Clone)]
pub struct DataInfoManager {
    inner: Arc<ManagerInner>,
}

/// Non-owning handle held by mirrors
#[derive(Clone)]
pub(crate) struct WeakDataInfoManager(Weak<ManagerInner>);

impl WeakDataInfoManager {
    pub(crate) fn upgrade(&self) -> Result<DataInfoManager> {
        self.0
            .upgrade()
            .map(|inner| DataInfoManager { inner })
            .ok_or_else(|| RemotingError::Disposed("DataInfoManager".to_string()))
    }
}

impl DataInfoManager {
    pub fn new(delegation: Arc<dyn Delegation>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                graph: Mutex::new(Some(ReferenceGraph::new())),
                delegation,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakDataInfoManager {
        WeakDataInfoManager(Arc::downgrade(&self.inner))
    }

    pub(crate) fn delegation(&self) -> &Arc<dyn Delegation> {
        &self.inner.delegation
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut ReferenceGraph) -> Result<R>) -> Result<R> {
        let mut guard = lock(&self.inner.graph);
        match guard.as_mut() {
            Some(graph) => f(graph),
            None => Err(RemotingError::Disposed("DataInfoManager".to_string())),
        }
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.inner.graph).is_none()
    }

    pub fn root_id(&self) -> Result<RefId> {
        self.with_graph(|graph| Ok(graph.root_id().to_string()))
    }

    /// Tracked target for `ref_id`, without adding a referer
    pub fn get(&self, ref_id: &str) -> Result<Option<ObjectRef>> {
        self.with_graph(|graph| Ok(graph.target(ref_id)))
    }

    pub fn contains(&self, ref_id: &str) -> bool {
        self.with_graph(|graph| Ok(graph.contains(ref_id)))
            .unwrap_or(false)
    }

    pub fn referer_count(&self, ref_id: &str) -> usize {
        self.with_graph(|graph| Ok(graph.referer_count(ref_id)))
            .unwrap_or(0)
    }

    /// Number of tracked values
    pub fn len(&self) -> usize {
        self.with_graph(|graph| Ok(graph.len())).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode `value`, tracking it under `parent_id` (the root when `None`)
    pub fn to_data_info(&self, value: &Value, parent_id: Option<&str>) -> Result<DataInfo> {
        self.with_graph(|graph| to_data_info_in(graph, value, parent_id, true))
    }

    /// Decode `info`, materializing mirrors for unknown references
    pub fn realize_data_info(&self, info: &DataInfo, parent_id: Option<&str>) -> Result<Value> {
        let weak = self.downgrade();
        self.with_graph(|graph| realize_in(graph, &weak, info, parent_id))
    }

    /// Add the edge `parent_id -> referee_id`
    pub fn add_reference_by_id(&self, referee_id: &str, parent_id: Option<&str>) -> Result<()> {
        self.with_graph(|graph| {
            let parent = parent_id.unwrap_or(graph.root_id()).to_string();
            graph.add_referer(referee_id, &parent)
        })
    }

    /// Remove the edge `parent_id -> ref_id`.
    ///
    /// Unless `locally` is set, the remote side is told to release its edge
    /// too. The notification is sent only when the edge existed, so repeated
    /// releases notify at most once.
    pub async fn release_by_id(
        &self,
        ref_id: &str,
        parent_id: Option<&str>,
        locally: bool,
    ) -> Result<()> {
        let removed = self.with_graph(|graph| Ok(graph.remove_referer(ref_id, parent_id)))?;
        if removed && !locally {
            debug!("Releasing remote reference {}", ref_id);
            self.inner.delegation.dispose(ref_id, parent_id).await?;
        }
        Ok(())
    }

    /// Release everything the root keeps alive, all at once, and stop
    /// tracking. Repeated calls are no-ops.
    pub async fn dispose(&self) -> Result<()> {
        let referees = {
            let guard = lock(&self.inner.graph);
            match guard.as_ref() {
                Some(graph) => graph.root_referees(),
                None => return Ok(()),
            }
        };

        join_all(referees.iter().map(|ref_id| {
            log_error_async(
                move || self.release_by_id(ref_id, None, false),
                "Failed to release reference during dispose",
            )
        }))
        .await;

        lock(&self.inner.graph).take();
        Ok(())
    }
}

fn inline_number(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn to_data_info_in(
    graph: &mut ReferenceGraph,
    value: &Value,
    parent_id: Option<&str>,
    recursive: bool,
) -> Result<DataInfo> {
    Ok(match value {
        Value::Undefined => DataInfo::undefined(),
        Value::Null => DataInfo::of(DataType::Null),
        Value::Boolean(b) => DataInfo::inline(DataType::Boolean, serde_json::Value::Bool(*b)),
        Value::Number(n) => DataInfo::inline(DataType::Number, inline_number(*n)),
        Value::String(s) => DataInfo::inline(DataType::String, serde_json::Value::String(s.clone())),
        Value::Symbol(s) => DataInfo::inline(DataType::Symbol, serde_json::Value::String(s.clone())),
        Value::Bytes(bytes) => DataInfo::inline(DataType::ByteBuffer, serde_json::Value::from(bytes.clone())),
        Value::Json(json) => DataInfo::inline(DataType::Object, json.clone()),
        Value::Object(object) => return object_data_info(graph, object, parent_id, recursive),
    })
}

fn object_data_info(
    graph: &mut ReferenceGraph,
    object: &ObjectRef,
    parent_id: Option<&str>,
    recursive: bool,
) -> Result<DataInfo> {
    let data_type = if object.is_callable() {
        DataType::Function
    } else {
        DataType::Object
    };

    if let Some(id) = graph.ref_id_of(object) {
        let referer = parent_id.unwrap_or(graph.root_id()).to_string();
        graph.add_referer(&id, &referer)?;
        return Ok(graph
            .cached_data_info(&id)
            .cloned()
            .unwrap_or_else(|| DataInfo::reference(data_type, id)));
    }

    if let Some(json) = object.to_json() {
        return Ok(DataInfo::inline(DataType::Object, json));
    }

    let id = graph.refer(Arc::clone(object), parent_id)?;
    if data_type == DataType::Function || !recursive {
        return Ok(DataInfo::reference(data_type, id));
    }

    let mut members = BTreeMap::new();
    for (name, member) in object.members() {
        members.insert(name, to_data_info_in(graph, &member, Some(&id), false)?);
    }
    let info = DataInfo::reference(data_type, id.clone()).with_members(members);
    graph.set_cached_data_info(&id, info.clone());
    Ok(info)
}

fn realize_in(
    graph: &mut ReferenceGraph,
    manager: &WeakDataInfoManager,
    info: &DataInfo,
    parent_id: Option<&str>,
) -> Result<Value> {
    if let Some(id) = &info.id {
        if let Some(target) = graph.refer_by_id(id, parent_id)? {
            return Ok(Value::Object(target));
        }

        return match info.data_type {
            DataType::Object => {
                let mirror = Arc::new(ObjectMirror::new(
                    id.clone(),
                    parent_id.map(str::to_string),
                    manager.clone(),
                ));
                graph.insert_with_id(mirror.clone(), id.clone(), parent_id)?;
                if let Some(member_infos) = &info.member_infos {
                    let mut members = BTreeMap::new();
                    for (name, member_info) in member_infos {
                        members.insert(name.clone(), realize_in(graph, manager, member_info, Some(id))?);
                    }
                    mirror.set_members(members);
                }
                Ok(Value::Object(mirror))
            }
            DataType::Function => {
                let mirror = Arc::new(FunctionMirror::new(
                    id.clone(),
                    parent_id.map(str::to_string),
                    manager.clone(),
                ));
                graph.insert_with_id(mirror.clone(), id.clone(), parent_id)?;
                Ok(Value::Object(mirror))
            }
            other => Err(RemotingError::Protocol(format!(
                "{:?} data cannot be referenced by id {}",
                other, id
            ))),
        };
    }

    let value = info.value.as_ref();
    let invalid = |expected: &str| {
        RemotingError::Protocol(format!("{:?} data info without a {} value", info.data_type, expected))
    };

    Ok(match info.data_type {
        DataType::Undefined => Value::Undefined,
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Boolean(
            value
                .and_then(serde_json::Value::as_bool)
                .ok_or_else(|| invalid("boolean"))?,
        ),
        DataType::Number => Value::Number(value.and_then(serde_json::Value::as_f64).unwrap_or(f64::NAN)),
        DataType::String => Value::String(
            value
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| invalid("string"))?
                .to_string(),
        ),
        DataType::Symbol => Value::Symbol(
            value
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        DataType::ByteBuffer => {
            let bytes: Vec<u8> = match value {
                Some(json) => serde_json::from_value(json.clone())?,
                None => Vec::new(),
            };
            Value::Bytes(bytes)
        }
        DataType::Object => Value::Json(value.cloned().unwrap_or(serde_json::Value::Null)),
        DataType::Function => return Err(invalid("reference")),
    })
}
