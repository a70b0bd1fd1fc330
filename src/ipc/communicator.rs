//! Request/response messaging over one channel adapter
//!
//! Outbound requests are correlated with replies by message id through a table
//! of pending oneshot senders. Inbound requests are dispatched to the first
//! route whose pattern matches the path; the handler runs on its own task and
//! exactly one reply is written back.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RemotingError, Result};
use crate::ipc::channel::{self, ChannelAdapter, RawChannel};
use crate::ipc::pattern::RoutePattern;
use crate::ipc::protocol::{ErrorBody, Message};
use crate::utils::lock::{lock, read, write};
use crate::utils::timeout::{with_timeout, DEFAULT_REQUEST_TIMEOUT};

/// Async handler for inbound requests: `(communicator, path, body) -> reply body`
pub type RouteHandler = Arc<
    dyn Fn(Communicator, String, serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value>>
        + Send
        + Sync,
>;

/// Construction options
#[derive(Debug, Clone, Default)]
pub struct CommunicatorOptions {
    /// Identifier used in logs and errors; a UUID when absent
    pub id: Option<String>,
    /// Reply timeout; [`DEFAULT_REQUEST_TIMEOUT`] when absent
    pub timeout: Option<Duration>,
    /// Longest message line accepted by stream channels built in
    /// [`Communicator::from_channel`]
    pub max_message_length: Option<usize>,
}

impl CommunicatorOptions {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            timeout: None,
            max_message_length: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_message_length(mut self, max_length: usize) -> Self {
        self.max_message_length = Some(max_length);
        self
    }
}

type PendingReply = oneshot::Sender<Result<serde_json::Value>>;

struct Route {
    pattern: RoutePattern,
    handler: RouteHandler,
}

struct CommunicatorInner {
    id: String,
    timeout: Duration,
    channel: RwLock<Option<Arc<dyn ChannelAdapter>>>,
    routes: Mutex<Vec<Route>>,
    pending: Mutex<HashMap<String, PendingReply>>,
}

/// Request/response endpoint over one channel
#[derive(Clone)]
pub struct Communicator {
    inner: Arc<CommunicatorInner>,
}

impl Communicator {
    /// Build a communicator over an adapter. Must be called within a Tokio runtime.
    pub fn new(channel: Arc<dyn ChannelAdapter>, options: CommunicatorOptions) -> Result<Self> {
        let inner = Arc::new(CommunicatorInner {
            id: options.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            timeout: options.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            channel: RwLock::new(Some(Arc::clone(&channel))),
            routes: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        });

        let weak: Weak<CommunicatorInner> = Arc::downgrade(&inner);
        channel.set_data_handler(Some(Arc::new(move |msg: Message| {
            if let Some(inner) = weak.upgrade() {
                Communicator { inner }.on_message(msg);
            }
        })))?;

        debug!("Communicator {} created over {} channel", inner.id, channel.kind());
        Ok(Self { inner })
    }

    /// Wrap a raw transport in the matching adapter and build a communicator over it
    pub fn from_channel(raw: RawChannel, options: CommunicatorOptions) -> Result<Self> {
        let adapter = match options.max_message_length {
            Some(max_length) => channel::from_raw_with_limit(raw, max_length)?,
            None => channel::from_raw(raw)?,
        };
        Self::new(adapter, options)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn is_disposed(&self) -> bool {
        read(&self.inner.channel).is_none()
    }

    fn disposed_error(&self) -> RemotingError {
        RemotingError::Disposed(format!("Communicator ({})", self.inner.id))
    }

    fn channel(&self) -> Result<Arc<dyn ChannelAdapter>> {
        read(&self.inner.channel)
            .as_ref()
            .cloned()
            .ok_or_else(|| self.disposed_error())
    }

    /// Register a request handler. Patterns are tried in registration order.
    pub fn map<F, Fut>(&self, pattern: RoutePattern, handler: F) -> Result<()>
    where
        F: Fn(Communicator, String, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let handler: RouteHandler =
            Arc::new(move |communicator, path, body| Box::pin(handler(communicator, path, body)));
        self.map_handler(pattern, handler)
    }

    pub fn map_handler(&self, pattern: RoutePattern, handler: RouteHandler) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        debug!("Communicator {} mapped route {}", self.inner.id, pattern);
        lock(&self.inner.routes).push(Route { pattern, handler });
        Ok(())
    }

    /// Remove the route registered under `pattern`, returning its handler
    pub fn unmap(&self, pattern: &RoutePattern) -> Result<Option<RouteHandler>> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let mut routes = lock(&self.inner.routes);
        let removed = routes
            .iter()
            .position(|route| &route.pattern == pattern)
            .map(|index| routes.remove(index).handler);
        Ok(removed)
    }

    /// Send a request and wait for its reply.
    ///
    /// Fails immediately when the channel reports itself closed; otherwise
    /// resolves with the reply body, rejects with the remote error, or times
    /// out. A reply arriving after the timeout is dropped.
    pub async fn send_async(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let channel = self.channel()?;
        if path.trim().is_empty() {
            return Err(RemotingError::InvalidArgument(
                "path must be a non-empty string".to_string(),
            ));
        }

        let msg = Message::request(path, body);
        let id = msg.id.clone();
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id.clone(), tx);

        match channel.send_message(&msg) {
            Ok(true) => {}
            Ok(false) => {
                lock(&self.inner.pending).remove(&id);
                return Err(RemotingError::ChannelClosed(format!(
                    "Communicator ({}) failed to send request {} to \"{}\"",
                    self.inner.id, id, path
                )));
            }
            Err(e) => {
                lock(&self.inner.pending).remove(&id);
                return Err(e);
            }
        }
        debug!("Communicator {} sent request {} to {}", self.inner.id, id, path);

        match with_timeout(rx, self.inner.timeout).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(self.disposed_error()),
            Err(_) => {
                lock(&self.inner.pending).remove(&id);
                Err(RemotingError::Timeout {
                    path: path.to_string(),
                    timeout_ms: self.inner.timeout.as_millis() as u64,
                })
            }
        }
    }

    fn on_message(&self, msg: Message) {
        if msg.is_request() {
            self.on_request(msg);
            return;
        }

        let pending = lock(&self.inner.pending).remove(&msg.id);
        match pending {
            Some(tx) => {
                let reply = if msg.succeeded == Some(true) {
                    Ok(msg.body)
                } else {
                    Err(RemotingError::Remote(ErrorBody::message_of(&msg.body)))
                };
                let _ = tx.send(reply);
            }
            None => debug!(
                "Communicator {} dropped reply {} with no pending request",
                self.inner.id, msg.id
            ),
        }
    }

    fn on_request(&self, msg: Message) {
        let path = msg.path.clone().unwrap_or_default();
        let handler = lock(&self.inner.routes)
            .iter()
            .find(|route| route.pattern.matches(&path))
            .map(|route| Arc::clone(&route.handler));

        let Some(handler) = handler else {
            warn!(
                "Communicator {} has no route for \"{}\", dropping request {}",
                self.inner.id, path, msg.id
            );
            return;
        };

        let communicator = self.clone();
        tokio::spawn(async move {
            let outcome = handler(communicator.clone(), path, msg.body.clone()).await;
            let reply = match outcome {
                Ok(body) => Message::reply(&msg, true, body),
                Err(e) => {
                    debug!("Request {} failed: {}", msg.id, e);
                    let body = serde_json::to_value(ErrorBody::new(e.to_string()))
                        .unwrap_or(serde_json::Value::Null);
                    Message::reply(&msg, false, body)
                }
            };

            match communicator.channel() {
                Ok(channel) => match channel.send_message(&reply) {
                    Ok(true) => {}
                    Ok(false) => warn!(
                        "Communicator {} could not reply to {}: channel closed",
                        communicator.inner.id, reply.id
                    ),
                    Err(e) => warn!(
                        "Communicator {} could not reply to {}: {}",
                        communicator.inner.id, reply.id, e
                    ),
                },
                Err(_) => debug!(
                    "Communicator {} disposed before replying to {}",
                    communicator.inner.id, reply.id
                ),
            }
        });
    }

    /// Resolves when the underlying channel closes
    pub async fn closed(&self) {
        if let Ok(channel) = self.channel() {
            channel.closed().await;
        }
    }

    /// Dispose the channel and reject every outstanding request.
    /// Repeated calls are no-ops.
    pub async fn dispose(&self) {
        let channel = write(&self.inner.channel).take();
        let Some(channel) = channel else {
            return;
        };

        if let Err(e) = channel.set_data_handler(None) {
            debug!("Communicator {} failed to detach handler: {}", self.inner.id, e);
        }
        channel.dispose().await;

        let pending: Vec<PendingReply> = lock(&self.inner.pending).drain().map(|(_, tx)| tx).collect();
        for tx in pending {
            let _ = tx.send(Err(self.disposed_error()));
        }
        lock(&self.inner.routes).clear();
        debug!("Communicator {} disposed", self.inner.id);
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("id", &self.inner.id)
            .field("timeout", &self.inner.timeout)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::channel::window;
    use serde_json::json;

    fn connected_pair(timeout: Duration) -> (Communicator, Communicator) {
        let (a, b) = window::pair();
        let left = Communicator::from_channel(
            RawChannel::Window(a),
            CommunicatorOptions::with_id("left").timeout(timeout),
        )
        .unwrap();
        let right = Communicator::from_channel(
            RawChannel::Window(b),
            CommunicatorOptions::with_id("right").timeout(timeout),
        )
        .unwrap();
        (left, right)
    }

    #[tokio::test]
    async fn test_request_reply() {
        let (left, right) = connected_pair(Duration::from_secs(5));
        right
            .map(RoutePattern::exact("/add"), |_, _, body| async move {
                let a = body["a"].as_i64().unwrap_or(0);
                let b = body["b"].as_i64().unwrap_or(0);
                Ok(json!(a + b))
            })
            .unwrap();

        let reply = left.send_async("/add", json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(reply, json!(5));
    }

    #[tokio::test]
    async fn test_handler_error_is_rejected() {
        let (left, right) = connected_pair(Duration::from_secs(5));
        right
            .map(RoutePattern::exact("/fail"), |_, _, _| async move {
                Err(RemotingError::InvalidArgument("bad input".to_string()))
            })
            .unwrap();

        let err = left.send_async("/fail", json!(null)).await.unwrap_err();
        match err {
            RemotingError::Remote(message) => assert!(message.contains("bad input")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_matching_route_wins() {
        let (left, right) = connected_pair(Duration::from_secs(5));
        right
            .map(RoutePattern::regex("^/items/").unwrap(), |_, _, _| async move {
                Ok(json!("regex"))
            })
            .unwrap();
        right
            .map(RoutePattern::exact("/items/1"), |_, _, _| async move { Ok(json!("exact")) })
            .unwrap();

        assert_eq!(left.send_async("/items/1", json!(null)).await.unwrap(), json!("regex"));
    }

    #[tokio::test]
    async fn test_unmap_returns_handler() {
        let (left, _right) = connected_pair(Duration::from_secs(5));
        let pattern = RoutePattern::exact("/x");
        left.map(pattern.clone(), |_, _, _| async move { Ok(json!(1)) })
            .unwrap();
        assert!(left.unmap(&pattern).unwrap().is_some());
        assert!(left.unmap(&pattern).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disposed_communicator_rejects_operations() {
        let (left, _right) = connected_pair(Duration::from_secs(5));
        left.dispose().await;
        left.dispose().await;

        assert!(left.is_disposed());
        let err = left.send_async("/x", json!(null)).await.unwrap_err();
        assert_eq!(err.to_string(), "Communicator (left) is disposed.");
        assert!(left
            .map(RoutePattern::exact("/x"), |_, _, _| async move { Ok(json!(null)) })
            .is_err());
        assert!(left.unmap(&RoutePattern::exact("/x")).is_err());
    }

    #[tokio::test]
    async fn test_dispose_rejects_pending() {
        let (left, _right) = connected_pair(Duration::from_secs(30));
        let sender = left.clone();
        let request = tokio::spawn(async move { sender.send_async("/never", json!(null)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        left.dispose().await;
        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, RemotingError::Disposed(_)));
    }

    #[tokio::test]
    async fn test_empty_path_is_invalid() {
        let (left, _right) = connected_pair(Duration::from_secs(5));
        assert!(matches!(
            left.send_async("  ", json!(null)).await,
            Err(RemotingError::InvalidArgument(_))
        ));
    }
}
