//! IPC layer
//!
//! Channel adapters normalize the supported transports (process pipes, stream
//! sockets, in-process window links) into one message contract; the
//! [`Communicator`] adds request/response correlation, timeouts and route
//! dispatch on top.

pub mod channel;
pub mod communicator;
pub mod pattern;
pub mod protocol;

pub use channel::{ChannelAdapter, DataHandler, RawChannel};
pub use communicator::{Communicator, CommunicatorOptions, RouteHandler};
pub use pattern::RoutePattern;
pub use protocol::{CorrelationId, ErrorBody, Message};
