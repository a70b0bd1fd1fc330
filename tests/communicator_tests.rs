//! Communicator integration tests
//!
//! Request/response over in-process links and byte-stream sockets, timeouts
//! and late replies.

mod common;

use common::communicator_pair;
use remoting_host::ipc::channel::RawChannel;
use remoting_host::ipc::{Communicator, CommunicatorOptions, RoutePattern};
use remoting_host::RemotingError;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_timeout_then_late_reply_is_dropped() {
    let (client, server) = communicator_pair(Duration::from_millis(50));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    server
        .map(RoutePattern::exact("/slow"), move |_, _, body| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(body)
            }
        })
        .unwrap();
    server
        .map(RoutePattern::exact("/fast"), |_, _, body| async move { Ok(body) })
        .unwrap();

    let err = client.send_async("/slow", json!(1)).await.unwrap_err();
    assert!(matches!(err, RemotingError::Timeout { timeout_ms: 50, .. }));

    // Let the stale reply arrive; it must not disturb later requests
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.send_async("/fast", json!("ok")).await.unwrap(), json!("ok"));

    client.dispose().await;
    server.dispose().await;
}

#[tokio::test]
async fn test_out_of_order_replies_match_by_id() {
    let (client, server) = communicator_pair(Duration::from_secs(5));
    server
        .map(RoutePattern::regex("^/delay/").unwrap(), |_, path, _| async move {
            let ms: u64 = path.trim_start_matches("/delay/").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(json!(ms))
        })
        .unwrap();

    let (slow, fast) = tokio::join!(
        client.send_async("/delay/120", json!(null)),
        client.send_async("/delay/10", json!(null)),
    );
    assert_eq!(slow.unwrap(), json!(120));
    assert_eq!(fast.unwrap(), json!(10));
}

#[tokio::test]
async fn test_socket_channel_round_trip() {
    let (a, b) = tokio::io::duplex(4096);
    let client = Communicator::from_channel(RawChannel::socket(a), CommunicatorOptions::with_id("client")).unwrap();
    let server = Communicator::from_channel(RawChannel::socket(b), CommunicatorOptions::with_id("server")).unwrap();

    server
        .map(RoutePattern::exact("/sum"), |_, _, body| async move {
            let sum: i64 = body
                .as_array()
                .map(|items| items.iter().filter_map(|v| v.as_i64()).sum())
                .unwrap_or(0);
            Ok(json!(sum))
        })
        .unwrap();
    server
        .map(RoutePattern::exact("/fail"), |_, _, _| async move {
            Err(RemotingError::InvalidArgument("no".to_string()))
        })
        .unwrap();

    assert_eq!(client.send_async("/sum", json!([1, 2, 3])).await.unwrap(), json!(6));
    let err = client.send_async("/fail", json!(null)).await.unwrap_err();
    assert_eq!(err, RemotingError::Remote("Invalid argument: no".to_string()));

    client.dispose().await;
    client.dispose().await;
    assert!(matches!(
        client.send_async("/sum", json!([])).await,
        Err(RemotingError::Disposed(_))
    ));
    server.dispose().await;
}

#[tokio::test]
async fn test_peer_disposal_closes_channel() {
    let (client, server) = communicator_pair(Duration::from_secs(1));
    server.dispose().await;
    tokio::time::timeout(Duration::from_secs(1), client.closed())
        .await
        .unwrap();
    assert!(client.send_async("/any", json!(null)).await.is_err());
}
