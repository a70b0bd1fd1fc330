//! Object remoting integration tests
//!
//! Two proxies joined by an in-process link exchange live objects and
//! functions; lifetimes are checked on the owning side.

mod common;

use common::{proxy_pair, CountingDelegation};
use proptest::prelude::*;
use remoting_host::remoting::{
    DataInfoManager, FunctionMirror, ObjectMirror, PropertyBag, RemoteObject, Value,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn counter_bag() -> Arc<PropertyBag> {
    let bag = Arc::new(PropertyBag::new().with("count", 1));
    let weak = Arc::downgrade(&bag);
    bag.set(
        "increment",
        Value::function("increment", move |_args| {
            let weak = weak.clone();
            async move {
                let bag = weak.upgrade().ok_or_else(|| {
                    remoting_host::RemotingError::Disposed("counter".to_string())
                })?;
                let next = bag.get("count").as_f64().unwrap_or(0.0) + 1.0;
                bag.set("count", next);
                Ok(Value::Number(next))
            }
        }),
    );
    bag
}

#[tokio::test]
async fn test_remote_object_reads_writes_and_calls_reach_owner() {
    let (owner, client) = proxy_pair();
    let bag = counter_bag();
    let served = Value::Object(bag.clone());
    owner.set_resolver_fn(move |_, name, _| {
        let served = served.clone();
        async move {
            Ok(match name.as_str() {
                "counter" => served,
                _ => Value::Undefined,
            })
        }
    });

    let remote = client.request_async("counter", vec![]).await.unwrap();
    let mirror = remote.as_object().unwrap();
    assert!(remote.downcast_ref::<ObjectMirror>().is_some());

    assert_eq!(mirror.get_member("count").await.unwrap(), Value::Number(1.0));

    assert!(mirror.set_member("count", Value::from(10)).await.unwrap());
    assert_eq!(bag.get("count"), Value::Number(10.0));

    let increment = mirror.get_member("increment").await.unwrap();
    assert!(increment.downcast_ref::<FunctionMirror>().is_some());
    let result = increment
        .as_object()
        .unwrap()
        .invoke(Value::Undefined, vec![])
        .await
        .unwrap();
    assert_eq!(result, Value::Number(11.0));
    assert_eq!(bag.get("count"), Value::Number(11.0));

    owner.dispose().await.unwrap();
    client.dispose().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_members_are_read_only() {
    let (owner, client) = proxy_pair();
    let bag = Arc::new(
        PropertyBag::new().with("run", Value::function("run", |_| async { Ok(Value::from("ran")) })),
    );
    let served = Value::Object(bag.clone());
    owner.set_resolver_fn(move |_, _, _| {
        let served = served.clone();
        async move { Ok(served) }
    });

    let remote = client.request_async("runner", vec![]).await.unwrap();
    let mirror = remote.as_object().unwrap();
    assert!(!mirror.set_member("run", Value::from(5)).await.unwrap());

    // Neither side changed
    let run = mirror.get_member("run").await.unwrap();
    assert!(run.downcast_ref::<FunctionMirror>().is_some());
    assert!(bag.get("run").is_function());
    let result = run.as_object().unwrap().invoke(Value::Undefined, vec![]).await.unwrap();
    assert_eq!(result, Value::from("ran"));
}

#[tokio::test]
async fn test_remote_function_with_arguments() {
    let (owner, client) = proxy_pair();
    owner.set_resolver_fn(|_, _, _| async {
        Ok(Value::function("add", |args| async move {
            let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
            Ok(Value::Number(sum))
        }))
    });

    let add = client.request_async("add", vec![]).await.unwrap();
    assert!(add.is_function());
    let sum = add
        .as_object()
        .unwrap()
        .invoke(Value::Undefined, vec![Value::from(2), Value::from(3)])
        .await
        .unwrap();
    assert_eq!(sum, Value::Number(5.0));
}

#[tokio::test]
async fn test_request_arguments_reach_resolver() {
    let (owner, client) = proxy_pair();
    owner.set_resolver_fn(|_, name, args| async move {
        let greeting = args.first().and_then(Value::as_str).unwrap_or("?").to_string();
        Ok(Value::String(format!("{} {}", greeting, name)))
    });

    let reply = client
        .request_async("world", vec![Value::from("hello")])
        .await
        .unwrap();
    assert_eq!(reply, Value::from("hello world"));

    // No resolver on the client side: requests toward it resolve to nothing
    let nothing = owner.request_async("anything", vec![]).await.unwrap();
    assert_eq!(nothing, Value::Undefined);
}

#[tokio::test]
async fn test_mirror_dispose_releases_owner_reference_once() {
    let (owner, client) = proxy_pair();
    let served = Value::Object(counter_bag());
    owner.set_resolver_fn(move |_, _, _| {
        let served = served.clone();
        async move { Ok(served) }
    });

    let remote = client.request_async("counter", vec![]).await.unwrap();
    let ref_id = remote.downcast_ref::<ObjectMirror>().unwrap().ref_id().to_string();
    assert!(owner.data_info_manager().contains(&ref_id));
    assert_eq!(owner.data_info_manager().referer_count(&ref_id), 1);

    let mirror = remote.as_object().unwrap();
    mirror.dispose().await.unwrap();
    mirror.dispose().await.unwrap();

    assert!(!client.data_info_manager().contains(&ref_id));
    assert!(!owner.data_info_manager().contains(&ref_id));
}

#[tokio::test]
async fn test_node_released_only_after_last_referer() {
    let delegation = Arc::new(CountingDelegation::default());
    let manager = DataInfoManager::new(delegation.clone());
    let root = manager.root_id().unwrap();

    let object = Value::object(PropertyBag::new());
    let ref_id = manager.to_data_info(&object, None).unwrap().id.unwrap();
    // Holding object is tracked under root as well
    let holder = Value::object(PropertyBag::new());
    let holder_id = manager.to_data_info(&holder, None).unwrap().id.unwrap();
    manager.add_reference_by_id(&ref_id, Some(&holder_id)).unwrap();
    assert_eq!(manager.referer_count(&ref_id), 2);

    manager.release_by_id(&ref_id, Some(&root), false).await.unwrap();
    assert!(manager.contains(&ref_id));
    assert_eq!(delegation.disposes.load(Ordering::SeqCst), 1);

    // Same edge again: nothing left to remove, nothing sent
    manager.release_by_id(&ref_id, Some(&root), false).await.unwrap();
    assert_eq!(delegation.disposes.load(Ordering::SeqCst), 1);

    manager.release_by_id(&ref_id, Some(&holder_id), false).await.unwrap();
    assert!(!manager.contains(&ref_id));
    assert_eq!(delegation.disposes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_proxy_dispose_is_idempotent() {
    let (owner, client) = proxy_pair();
    client.dispose().await.unwrap();
    client.dispose().await.unwrap();
    assert!(client.is_disposed());
    assert!(client.communicator().is_disposed());
    assert!(client.request_async("x", vec![]).await.is_err());
    owner.dispose().await.unwrap();
}

fn primitive() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ]
}

proptest! {
    #[test]
    fn prop_primitive_round_trip(value in primitive()) {
        let manager = DataInfoManager::new(Arc::new(CountingDelegation::default()));
        let info = manager.to_data_info(&value, None).unwrap();
        prop_assert!(info.id.is_none());

        let wire = serde_json::to_string(&info).unwrap();
        let decoded = serde_json::from_str(&wire).unwrap();
        let realized = manager.realize_data_info(&decoded, None).unwrap();
        prop_assert_eq!(realized, value);
    }
}
