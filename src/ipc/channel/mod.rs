//! Channel adapters
//!
//! A channel adapter normalizes one transport shape into a uniform
//! send/receive contract carrying [`Message`]s:
//!
//! - [`ProcessChannel`]: stdin/stdout pipes of a spawned child, or of this process
//! - [`WindowChannel`]: an in-process structured-message link
//! - [`SocketChannel`]: any async byte stream (TCP, Unix socket, in-memory duplex)
//!
//! [`from_raw`] probes the adapters in that order. Line based adapters skip
//! lines longer than their limit ([`DEFAULT_MAX_MESSAGE_LENGTH`]
//! unless set through [`from_raw_with_limit`]).

pub mod process;
pub mod socket;
pub mod stream;
pub mod window;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{RemotingError, Result};
use crate::ipc::protocol::Message;
use crate::utils::lock::lock;

pub use process::ProcessChannel;
pub use socket::SocketChannel;
pub use stream::DEFAULT_MAX_MESSAGE_LENGTH;
pub use window::{WindowChannel, WindowEndpoint};

/// Callback receiving every inbound message
pub type DataHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Byte stream usable by [`SocketChannel`]
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Raw transport handed to [`from_raw`]
pub enum RawChannel {
    /// Pipes of a spawned child host
    ChildProcess {
        stdin: ChildStdin,
        stdout: ChildStdout,
    },
    /// This process's own stdin/stdout, connected to the parent host
    ParentProcess,
    /// In-process message link
    Window(WindowEndpoint),
    /// Any bidirectional byte stream
    Socket(Box<dyn DuplexStream>),
}

impl RawChannel {
    pub fn socket<S: DuplexStream>(stream: S) -> Self {
        RawChannel::Socket(Box::new(stream))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawChannel::ChildProcess { .. } => "child-process",
            RawChannel::ParentProcess => "parent-process",
            RawChannel::Window(_) => "window",
            RawChannel::Socket(_) => "socket",
        }
    }
}

impl std::fmt::Debug for RawChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawChannel({})", self.kind())
    }
}

/// Uniform contract over one transport
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Transport name, for logging
    fn kind(&self) -> &'static str;

    /// Write a message. `Ok(false)` means the channel is closed.
    fn send_message(&self, msg: &Message) -> Result<bool>;

    /// Install or remove the inbound handler
    fn set_data_handler(&self, handler: Option<DataHandler>) -> Result<()>;

    /// Resolves once the peer hangs up or the adapter is disposed
    async fn closed(&self);

    fn is_disposed(&self) -> bool;

    /// Stop listening and release the transport. Repeated calls are no-ops.
    async fn dispose(&self);
}

/// Wrap a raw transport in the first adapter that accepts it
pub fn from_raw(raw: RawChannel) -> Result<Arc<dyn ChannelAdapter>> {
    from_raw_with_limit(raw, DEFAULT_MAX_MESSAGE_LENGTH)
}

/// [`from_raw`] with the longest message line the stream adapters accept
pub fn from_raw_with_limit(raw: RawChannel, max_length: usize) -> Result<Arc<dyn ChannelAdapter>> {
    if ProcessChannel::is_valid_channel(&raw) {
        return Ok(Arc::new(ProcessChannel::with_max_length(raw, max_length)?));
    }
    if WindowChannel::is_valid_channel(&raw) {
        return Ok(Arc::new(WindowChannel::new(raw)?));
    }
    if SocketChannel::is_valid_channel(&raw) {
        return Ok(Arc::new(SocketChannel::with_max_length(raw, max_length)?));
    }
    Err(RemotingError::InvalidArgument(format!(
        "unsupported channel type: {}",
        raw.kind()
    )))
}

#[derive(Default)]
struct Dispatch {
    handler: Option<DataHandler>,
    backlog: VecDeque<Message>,
}

/// State shared by every adapter: disposed flag, inbound handler, close signal.
///
/// Messages arriving before a handler is installed are buffered and handed
/// over when one is.
pub(crate) struct ChannelState {
    kind: &'static str,
    disposed: AtomicBool,
    dispatch: Mutex<Dispatch>,
    closed_tx: watch::Sender<bool>,
}

impl ChannelState {
    pub(crate) fn new(kind: &'static str) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            kind,
            disposed: AtomicBool::new(false),
            dispatch: Mutex::new(Dispatch::default()),
            closed_tx,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(RemotingError::Disposed(format!("Channel ({})", self.kind)));
        }
        Ok(())
    }

    pub(crate) fn set_data_handler(&self, handler: Option<DataHandler>) -> Result<()> {
        if handler.is_some() {
            self.ensure_live()?;
        }
        let (handler, backlog) = {
            let mut dispatch = lock(&self.dispatch);
            dispatch.handler = handler.clone();
            let backlog = match handler {
                Some(_) => std::mem::take(&mut dispatch.backlog),
                None => VecDeque::new(),
            };
            (handler, backlog)
        };
        if let Some(handler) = handler {
            for msg in backlog {
                handler(msg);
            }
        }
        Ok(())
    }

    pub(crate) fn deliver(&self, msg: Message) {
        if self.is_disposed() {
            debug!("{} channel disposed, dropping message {}", self.kind, msg.id);
            return;
        }
        let handler = {
            let mut dispatch = lock(&self.dispatch);
            match dispatch.handler.clone() {
                Some(handler) => handler,
                None => {
                    dispatch.backlog.push_back(msg);
                    return;
                }
            }
        };
        handler(msg);
    }

    pub(crate) fn mark_closed(&self) {
        self.closed_tx.send_replace(true);
    }

    pub(crate) async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives as long as self, so wait_for only fails after drop.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Flip the disposed flag. Returns false when already disposed.
    pub(crate) fn begin_dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut dispatch = lock(&self.dispatch);
        dispatch.handler = None;
        dispatch.backlog.clear();
        true
    }
}
