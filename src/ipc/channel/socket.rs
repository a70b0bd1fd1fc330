//! Stream socket adapter

use async_trait::async_trait;

use crate::error::{RemotingError, Result};
use crate::ipc::channel::stream::{LineTransport, DEFAULT_MAX_MESSAGE_LENGTH};
use crate::ipc::channel::{ChannelAdapter, DataHandler, RawChannel};
use crate::ipc::protocol::Message;

/// Line-delimited JSON over any bidirectional byte stream
pub struct SocketChannel {
    transport: LineTransport,
}

impl SocketChannel {
    pub fn is_valid_channel(raw: &RawChannel) -> bool {
        matches!(raw, RawChannel::Socket(_))
    }

    /// Must be called within a Tokio runtime
    pub fn new(raw: RawChannel) -> Result<Self> {
        Self::with_max_length(raw, DEFAULT_MAX_MESSAGE_LENGTH)
    }

    /// Like [`SocketChannel::new`], skipping lines longer than `max_length` bytes
    pub fn with_max_length(raw: RawChannel, max_length: usize) -> Result<Self> {
        match raw {
            RawChannel::Socket(stream) => {
                let (reader, writer) = tokio::io::split(stream);
                Ok(Self {
                    transport: LineTransport::spawn("socket", reader, writer, max_length),
                })
            }
            other => Err(RemotingError::InvalidArgument(format!(
                "{} is not a socket channel",
                other.kind()
            ))),
        }
    }
}

#[async_trait]
impl ChannelAdapter for SocketChannel {
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
