//! Remoting Host - cross-process component hosting
//!
//! This crate lets a process tree share components as if they were local:
//! modules register components with a module manager, and a lookup that
//! misses locally travels to child hosts and to the parent host over IPC.
//!
//! ## Layers
//!
//! 1. [`ipc`]: channel adapters and the request/response [`Communicator`]
//! 2. [`remoting`]: live values exchanged by reference, with a distributed
//!    reference graph keeping both sides' lifetimes consistent
//! 3. [`module`]: dependency injection, module loading and the host tree
//!
//! ## Design Principles
//!
//! 1. **Explicit member access**: remote objects expose `get_member`,
//!    `set_member` and `invoke` instead of intercepting access implicitly
//! 2. **Arena reference graph**: cross-boundary references live in an id-keyed
//!    node table, never in object fields
//! 3. **Disposal is idempotent**, and any other use after disposal is an error

pub mod config;
pub mod error;
pub mod ipc;
pub mod module;
pub mod remoting;
pub mod utils;

pub use config::HostConfig;
pub use error::{RemotingError, Result};
pub use ipc::{Communicator, CommunicatorOptions, Message, RawChannel, RoutePattern};
pub use module::{ComponentInfo, Module, ModuleError, ModuleInfo, ModuleManager};
pub use remoting::{DataInfo, DataInfoManager, ObjectRemotingProxy, RemoteObject, Value};
