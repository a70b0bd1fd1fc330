//! Timeout utilities
//!
//! The only cancellation primitive in the remoting layer is the per-communicator
//! reply timeout. Configurable through `ipc.request_timeout_ms`
//! (see [`crate::config::IpcConfig`]).

use std::time::Duration;
use tokio::time::{timeout, Timeout};

/// Default reply timeout for communicator requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period given to a child host to exit after its channel is closed
pub const DEFAULT_HOST_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Apply timeout to a future
pub fn with_timeout<F>(future: F, duration: Duration) -> Timeout<F>
where
    F: std::future::Future,
{
    timeout(duration, future)
}
