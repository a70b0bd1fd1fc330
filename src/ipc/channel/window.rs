//! In-process message link
//!
//! Two [`WindowEndpoint`]s created by [`pair`] exchange whole JSON texts, one
//! per message, the way a renderer window talks to its host.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RemotingError, Result};
use crate::ipc::channel::{ChannelAdapter, ChannelState, DataHandler, RawChannel};
use crate::ipc::protocol::Message;
use crate::utils::lock::lock;

/// One side of an in-process link
pub struct WindowEndpoint {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Create two connected endpoints
pub fn pair() -> (WindowEndpoint, WindowEndpoint) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        WindowEndpoint { tx: a_tx, rx: b_rx },
        WindowEndpoint { tx: b_tx, rx: a_rx },
    )
}

pub struct WindowChannel {
    state: Arc<ChannelState>,
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WindowChannel {
    pub fn is_valid_channel(raw: &RawChannel) -> bool {
        matches!(raw, RawChannel::Window(_))
    }

    /// Must be called within a Tokio runtime
    pub fn new(raw: RawChannel) -> Result<Self> {
        let endpoint = match raw {
            RawChannel::Window(endpoint) => endpoint,
            other => {
                return Err(RemotingError::InvalidArgument(format!(
                    "{} is not a window channel",
                    other.kind()
                )))
            }
        };
        let WindowEndpoint { tx, mut rx } = endpoint;

        let state = Arc::new(ChannelState::new("window"));
        let reader_state = Arc::clone(&state);
        let reader = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                match Message::from_text(&text) {
                    Ok(msg) => reader_state.deliver(msg),
                    Err(e) => warn!("window channel dropped malformed message: {}", e),
                }
            }
            debug!("window channel peer hung up");
            reader_state.mark_closed();
        });

        Ok(Self {
            state,
            tx: Mutex::new(Some(tx)),
            reader: Mutex::new(Some(reader)),
        })
    }
}

#[async_trait]
impl ChannelAdapter for WindowChannel {
    fn kind(&self) -> &'static str {
        self.state.kind()
    }

    fn send_message(&self, msg: &Message) -> Result<bool> {
        self.state.ensure_live()?;
        if self.state.is_closed() {
            return Ok(false);
        }
        let text = msg.to_text()?;
        match lock(&self.tx).as_ref() {
            Some(tx) => Ok(tx.send(text).is_ok()),
            None => Ok(false),
        }
    }

    fn set_data_handler(&self, handler: Option<DataHandler>) -> Result<()> {
        self.state.set_data_handler(handler)
    }

    async fn closed(&self) {
        self.state.closed().await
    }

    fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    async fn dispose(&self) {
        if !self.state.begin_dispose() {
            return;
        }
        lock(&self.tx).take();
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        self.state.mark_closed();
    }
}

impl Drop for WindowChannel {
    fn drop(&mut self) {
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
    }
}
