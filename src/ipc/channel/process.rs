//! Process pipe adapter
//!
//! Connects a parent host to a child host over the child's stdin/stdout, one
//! JSON message per line. The child side uses its own stdin/stdout; logging
//! therefore goes to stderr.

use async_trait::async_trait;

use crate::error::{RemotingError, Result};
use crate::ipc::channel::stream::{LineTransport, DEFAULT_MAX_MESSAGE_LENGTH};
use crate::ipc::channel::{ChannelAdapter, DataHandler, RawChannel};
use crate::ipc::protocol::Message;

pub struct ProcessChannel {
    transport: LineTransport,
}

impl ProcessChannel {
    pub fn is_valid_channel(raw: &RawChannel) -> bool {
        matches!(raw, RawChannel::ChildProcess { .. } | RawChannel::ParentProcess)
    }

    /// Must be called within a Tokio runtime
    pub fn new(raw: RawChannel) -> Result<Self> {
        Self::with_max_length(raw, DEFAULT_MAX_MESSAGE_LENGTH)
    }

    /// Like [`ProcessChannel::new`], skipping lines longer than `max_length` bytes
    pub fn with_max_length(raw: RawChannel, max_length: usize) -> Result<Self> {
        let transport = match raw {
            RawChannel::ChildProcess { stdin, stdout } => {
                LineTransport::spawn("child-process", stdout, stdin, max_length)
            }
            RawChannel::ParentProcess => LineTransport::spawn(
                "parent-process",
                tokio::io::stdin(),
                tokio::io::stdout(),
                max_length,
            ),
            other => {
                return Err(RemotingError::InvalidArgument(format!(
                    "{} is not a process channel",
                    other.kind()
                )))
            }
        };
        Ok(Self { transport })
    }
}

#[async_trait]
impl ChannelAdapter for ProcessChannel {
    fn kind(&self) -> &'static str {
        self.transport.state.kind()
    }

    fn send_message(&self, msg: &Message) -> Result<bool> {
        self.transport.send(msg)
    }

    fn set_data_handler(&self, handler: Option<DataHandler>) -> Result<()> {
        self.transport.state.set_data_handler(handler)
    }

    async fn closed(&self) {
        self.transport.state.closed().await
    }

    fn is_disposed(&self) -> bool {
        self.transport.state.is_disposed()
    }

    async fn dispose(&self) {
        self.transport.shutdown();
    }
}
