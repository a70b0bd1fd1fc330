//! Values that can cross a remoting boundary
//!
//! Plain data travels by value. Anything else is a [`RemoteObject`]: a live
//! object exposing its members through explicit `get_member` / `set_member` /
//! `invoke` capabilities, transferred by reference and mirrored on the other
//! side.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::error::{RemotingError, Result};
use crate::remoting::data_info::DataType;
use crate::utils::lock::{read, write};

/// Shared handle to a live object
pub type ObjectRef = Arc<dyn RemoteObject>;

/// Downcasting support for [`RemoteObject`] implementors
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A live object reachable across the remoting boundary.
///
/// Every method has a default so plain holder types only override what they
/// expose. `members` is the declared snapshot captured on first transfer;
/// members not in it are fetched lazily through `get_member`.
#[async_trait]
pub trait RemoteObject: AsAny + Send + Sync {
    fn is_callable(&self) -> bool {
        false
    }

    /// Serialization hook. An object returning `Some` is sent by value.
    fn to_json(&self) -> Option<serde_json::Value> {
        None
    }

    fn members(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    async fn get_member(&self, _name: &str) -> Result<Value> {
        Ok(Value::Undefined)
    }

    /// Returns whether the assignment took effect
    async fn set_member(&self, _name: &str, _value: Value) -> Result<bool> {
        Ok(false)
    }

    async fn invoke(&self, _this: Value, _args: Vec<Value>) -> Result<Value> {
        Err(RemotingError::NotCallable(std::any::type_name::<Self>().to_string()))
    }

    async fn dispose(&self) -> Result<()> {
        Ok(())
    }
}

/// A value crossing the boundary
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    /// Symbol, carried by description
    Symbol(String),
    Bytes(Vec<u8>),
    /// Serializable structured data, sent by value
    Json(serde_json::Value),
    /// Live object or function, sent by reference
    Object(ObjectRef),
}

impl Value {
    pub fn object<T: RemoteObject + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Wrap an async closure as a callable value
    pub fn function<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Value::object(FunctionObject::new(name, f))
    }

    /// `Undefined` and `Null` carry no answer
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Object(object) if object.is_callable())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Undefined => DataType::Undefined,
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Number(_) => DataType::Number,
            Value::String(_) => DataType::String,
            Value::Symbol(_) => DataType::Symbol,
            Value::Bytes(_) => DataType::ByteBuffer,
            Value::Json(_) => DataType::Object,
            Value::Object(object) if object.is_callable() => DataType::Function,
            Value::Object(_) => DataType::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Json(json) => json.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Json(json) => json.as_bool(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow the concrete type behind a local object
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object()
            .and_then(|object| object.as_ref().as_any().downcast_ref::<T>())
    }

    /// Plain-data view, if this value has one
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::Undefined | Value::Null => Some(serde_json::Value::Null),
            Value::Boolean(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => Some(
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            ),
            Value::String(s) | Value::Symbol(s) => Some(serde_json::Value::String(s.clone())),
            Value::Bytes(bytes) => Some(serde_json::Value::from(bytes.clone())),
            Value::Json(json) => Some(json.clone()),
            Value::Object(object) => object.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Symbol(s) => write!(f, "Symbol({:?})", s),
            Value::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Value::Json(json) => write!(f, "Json({})", json),
            Value::Object(object) if object.is_callable() => f.write_str("Function(..)"),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }
}

impl<T: RemoteObject + 'static> From<Arc<T>> for Value {
    fn from(object: Arc<T>) -> Self {
        Value::Object(object)
    }
}

/// Async closure invoked with `(this, args)`
pub type FunctionHandler = Arc<dyn Fn(Value, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Callable object backed by a closure
pub struct FunctionObject {
    name: String,
    handler: FunctionHandler,
}

impl FunctionObject {
    pub fn new<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::with_this(name, move |_this, args| f(args))
    }

    /// Closure receiving the `this` argument as well
    pub fn with_this<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            handler: Arc::new(move |this, args| Box::pin(f(this, args))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RemoteObject for FunctionObject {
    fn is_callable(&self) -> bool {
        true
    }

    async fn get_member(&self, name: &str) -> Result<Value> {
        Ok(match name {
            "name" => Value::String(self.name.clone()),
            _ => Value::Undefined,
        })
    }

    async fn invoke(&self, this: Value, args: Vec<Value>) -> Result<Value> {
        (self.handler)(this, args).await
    }
}

/// Mutable property bag.
///
/// Function-valued properties form the member snapshot; data properties are
/// read and written through `get_member` / `set_member`, so a remote mirror
/// always observes their current value.
#[derive(Default)]
pub struct PropertyBag {
    properties: RwLock<BTreeMap<String, Value>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        write(&self.properties).insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Value {
        read(&self.properties).get(name).cloned().unwrap_or_default()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        write(&self.properties).insert(name.to_string(), value.into());
    }
}

#[async_trait]
impl RemoteObject for PropertyBag {
    fn members(&self) -> Vec<(String, Value)> {
        read(&self.properties)
            .iter()
            .filter(|(_, value)| value.is_function())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    async fn get_member(&self, name: &str) -> Result<Value> {
        Ok(self.get(name))
    }

    async fn set_member(&self, name: &str, value: Value) -> Result<bool> {
        self.set(name, value);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_function_object_invokes_closure() {
        let f = Value::function("double", |args| async move {
            let n = args.first().and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::Number(n * 2.0))
        });
        assert!(f.is_function());
        assert_eq!(f.data_type(), DataType::Function);

        let object = f.as_object().unwrap();
        let result = object.invoke(Value::Undefined, vec![Value::from(21)]).await.unwrap();
        assert_eq!(result, Value::Number(42.0));
    }

    #[tokio::test]
    async fn test_non_callable_invoke_fails() {
        let bag = PropertyBag::new();
        assert!(matches!(
            bag.invoke(Value::Undefined, vec![]).await,
            Err(RemotingError::NotCallable(_))
        ));
    }

    #[tokio::test]
    async fn test_property_bag_snapshot_holds_functions_only() {
        let bag = PropertyBag::new()
            .with("count", 1)
            .with("reset", Value::function("reset", |_| async { Ok(Value::Undefined) }));
        let members = bag.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0, "reset");

        assert!(bag.set_member("count", Value::from(2)).await.unwrap());
        assert_eq!(bag.get_member("count").await.unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_downcast_and_identity() {
        let a = Value::object(PropertyBag::new());
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::object(PropertyBag::new()));
        assert!(a.downcast_ref::<PropertyBag>().is_some());
        assert!(a.downcast_ref::<FunctionObject>().is_none());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from(serde_json::json!(null)), Value::Null);
        assert_eq!(Value::from(serde_json::json!("x")), Value::String("x".into()));
        assert!(matches!(Value::from(serde_json::json!({"a": 1})), Value::Json(_)));
    }
}
