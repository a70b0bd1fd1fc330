//! Proxy-level envelope and the delegation sub-protocol
//!
//! Carried in a message `body`:
//!
//! - `{action: "RequestResource", resourceId, extraArgs: [DataInfo]}`
//! - `{action: "Delegate", delegateType: "Get"|"Set"|"Apply"|"Dispose", content}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RemotingError, Result};
use crate::ipc::communicator::Communicator;
use crate::remoting::data_info::{DataInfo, RefId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationType {
    Get,
    Set,
    Apply,
    Dispose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ProxyMessage {
    #[serde(rename_all = "camelCase")]
    RequestResource {
        resource_id: String,
        #[serde(default)]
        extra_args: Vec<DataInfo>,
    },
    #[serde(rename_all = "camelCase")]
    Delegate {
        delegate_type: String,
        #[serde(default)]
        content: serde_json::Value,
    },
}

impl ProxyMessage {
    pub fn delegate<T: Serialize>(delegate_type: DelegationType, content: &T) -> Result<Self> {
        let delegate_type = match serde_json::to_value(delegate_type)? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(ProxyMessage::Delegate {
            delegate_type,
            content: serde_json::to_value(content)?,
        })
    }
}

/// Parse a delegate type name; unknown names are protocol violations
pub fn parse_delegation_type(name: &str) -> Result<DelegationType> {
    serde_json::from_value(serde_json::Value::String(name.to_string())).map_err(|_| {
        RemotingError::Protocol(format!("Unknown delegation type: {}", name))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertyContent {
    pub ref_id: RefId,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPropertyContent {
    pub ref_id: RefId,
    pub property: String,
    pub value: DataInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyContent {
    pub ref_id: RefId,
    pub this_arg: DataInfo,
    #[serde(default)]
    pub args: Vec<DataInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposeContent {
    pub ref_id: RefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RefId>,
}

/// Remote side of a reference graph: the operations mirrors forward
#[async_trait]
pub trait Delegation: Send + Sync {
    async fn get_property(&self, ref_id: &str, property: &str) -> Result<DataInfo>;

    async fn set_property(&self, ref_id: &str, property: &str, value: DataInfo) -> Result<bool>;

    async fn apply(&self, ref_id: &str, this_arg: DataInfo, args: Vec<DataInfo>) -> Result<DataInfo>;

    /// Ask the remote side to drop the edge `parent_id -> ref_id`
    async fn dispose(&self, ref_id: &str, parent_id: Option<&str>) -> Result<()>;
}

/// Delegation sending `Delegate` messages through a communicator
pub struct CommunicatorDelegation {
    communicator: Communicator,
    path: String,
}

impl CommunicatorDelegation {
    pub fn new(communicator: Communicator, path: impl Into<String>) -> Self {
        Self {
            communicator,
            path: path.into(),
        }
    }

    async fn delegate<T: Serialize + Sync>(
        &self,
        delegate_type: DelegationType,
        content: &T,
    ) -> Result<serde_json::Value> {
        let body = serde_json::to_value(ProxyMessage::delegate(delegate_type, content)?)?;
        self.communicator.send_async(&self.path, body).await
    }
}

#[async_trait]
impl Delegation for CommunicatorDelegation {
    async fn get_property(&self, ref_id: &str, property: &str) -> Result<DataInfo> {
        let content = GetPropertyContent {
            ref_id: ref_id.to_string(),
            property: property.to_string(),
        };
        let reply = self.delegate(DelegationType::Get, &content).await?;
        Ok(serde_json::from_value(reply)?)
    }

    async fn set_property(&self, ref_id: &str, property: &str, value: DataInfo) -> Result<bool> {
        let content = SetPropertyContent {
            ref_id: ref_id.to_string(),
            property: property.to_string(),
            value,
        };
        let reply = self.delegate(DelegationType::Set, &content).await?;
        Ok(reply.as_bool().unwrap_or(false))
    }

    async fn apply(&self, ref_id: &str, this_arg: DataInfo, args: Vec<DataInfo>) -> Result<DataInfo> {
        let content = ApplyContent {
            ref_id: ref_id.to_string(),
            this_arg,
            args,
        };
        let reply = self.delegate(DelegationType::Apply, &content).await?;
        Ok(serde_json::from_value(reply)?)
    }

    async fn dispose(&self, ref_id: &str, parent_id: Option<&str>) -> Result<()> {
        let content = DisposeContent {
            ref_id: ref_id.to_string(),
            parent_id: parent_id.map(str::to_string),
        };
        self.delegate(DelegationType::Dispose, &content).await?;
        Ok(())
    }
}
