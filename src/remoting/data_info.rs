//! Wire encoding of values crossing a remoting boundary
//!
//! `{type, value?, id?, memberInfos?}` is the only structure ever sent in place
//! of a live value. Plain data is carried inline in `value`; referenced
//! objects and functions carry the `id` of their node in the sender's
//! reference graph, and objects may carry a member snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of a reference node
pub type RefId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    Undefined,
    Null,
    Object,
    Boolean,
    Number,
    String,
    Symbol,
    Function,
    ByteBuffer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RefId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_infos: Option<BTreeMap<String, DataInfo>>,
}

impl DataInfo {
    pub fn undefined() -> Self {
        Self::of(DataType::Undefined)
    }

    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type,
            value: None,
            id: None,
            member_infos: None,
        }
    }

    /// Plain data carried by value
    pub fn inline(data_type: DataType, value: serde_json::Value) -> Self {
        Self {
            value: Some(value),
            ..Self::of(data_type)
        }
    }

    /// Reference to a node in the sender's graph
    pub fn reference(data_type: DataType, id: RefId) -> Self {
        Self {
            id: Some(id),
            ..Self::of(data_type)
        }
    }

    pub fn with_members(mut self, members: BTreeMap<String, DataInfo>) -> Self {
        self.member_infos = Some(members);
        self
    }

    pub fn is_reference(&self) -> bool {
        self.id.is_some()
    }
}
