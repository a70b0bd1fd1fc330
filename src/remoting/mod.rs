//! Distributed object remoting
//!
//! Live values cross a channel as [`DataInfo`]: plain data inline, everything
//! else as a reference into the sender's [`ReferenceGraph`]. The receiver
//! materializes references as mirrors forwarding member access and calls
//! back to the owner. Lifetimes are kept consistent on both sides by the
//! release protocol of [`DataInfoManager`]; [`ObjectRemotingProxy`] ties it
//! to one communicator route.

pub mod data_info;
pub mod delegate;
pub mod manager;
pub mod mirror;
pub mod proxy;
pub mod reference;
pub mod value;

pub use data_info::{DataInfo, DataType, RefId};
pub use delegate::{CommunicatorDelegation, Delegation, DelegationType, ProxyMessage};
pub use manager::DataInfoManager;
pub use mirror::{FunctionMirror, ObjectMirror, DISPOSE_MEMBER};
pub use proxy::{ObjectRemotingProxy, Resolver};
pub use reference::{ReferenceGraph, ReferenceNode};
pub use value::{AsAny, FunctionObject, ObjectRef, PropertyBag, RemoteObject, Value};
