//! Error handling utilities for best-effort operations
//!
//! Disposal paths keep going when one step fails; these helpers log the
//! failure and carry on.

use tracing::warn;

/// Execute an async operation and log errors without failing
///
/// Returns `Some(T)` on success, `None` on error (after logging).
///
/// # Example
/// ```rust,ignore
/// use remoting_host::utils::log_error_async;
///
/// log_error_async(|| proxy.dispose(), "Failed to dispose host proxy").await;
/// ```
pub async fn log_error_async<F, Fut, T, E>(operation: F, context: &str) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match operation().await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_error_async() {
        let value = log_error_async(|| async { Err::<i32, _>("bad") }, "ctx").await;
        assert!(value.is_none());
        let value = log_error_async(|| async { Ok::<_, String>(1) }, "ctx").await;
        assert_eq!(value, Some(1));
    }
}
