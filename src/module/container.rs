//! Dependency-injection container
//!
//! Maps component names to descriptors. Descriptor builders:
//!
//! - [`dedication`]: resolves declared dependencies, then calls the factory
//! - [`lazy_singleton`]: evaluates once and caches the result
//! - [`singleton`]: always returns a fixed value

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;

use crate::module::traits::{ComponentDescriptor, ModuleError};
use crate::remoting::value::Value;
use crate::utils::lock::{read, write};

/// Registered descriptor: call-site args in, component out
pub type DiDescriptor = ComponentDescriptor;

/// Resolves one dependency by name; `None` when nothing provides it
pub type DependencyLookup =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<Value>, ModuleError>> + Send + Sync>;

#[derive(Default)]
pub struct DiContainer {
    descriptors: RwLock<HashMap<String, DiDescriptor>>,
}

impl DiContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        read(&self.descriptors).contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, descriptor: DiDescriptor) {
        write(&self.descriptors).insert(name.into(), descriptor);
    }

    /// Insert every entry, or none when any name is already taken
    pub fn set_all(&self, entries: Vec<(String, DiDescriptor)>) -> Result<(), ModuleError> {
        let mut descriptors = write(&self.descriptors);
        for (index, (name, _)) in entries.iter().enumerate() {
            let repeated = entries[..index].iter().any(|(other, _)| other == name);
            if repeated || descriptors.contains_key(name) {
                return Err(ModuleError::DuplicateComponent(name.clone()));
            }
        }
        descriptors.extend(entries);
        Ok(())
    }

    /// Start resolving `name`; `None` when it is not registered here
    pub fn get_dep(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Option<BoxFuture<'static, Result<Value, ModuleError>>> {
        let descriptor = read(&self.descriptors).get(name).cloned()?;
        Some(descriptor(args))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.descriptors).keys().cloned().collect();
        names.sort();
        names
    }
}

/// Resolve `deps` through `lookup` and pass them positionally, followed by
/// the call-site arguments. Blank dependency names are passed as `Null`.
pub fn dedication(
    descriptor: ComponentDescriptor,
    deps: Vec<String>,
    lookup: DependencyLookup,
) -> DiDescriptor {
    if deps.is_empty() {
        return descriptor;
    }
    let deps = Arc::new(deps);
    Arc::new(move |extra_args: Vec<Value>| {
        let descriptor = Arc::clone(&descriptor);
        let deps = Arc::clone(&deps);
        let lookup = Arc::clone(&lookup);
        Box::pin(async move {
            let mut args = Vec::with_capacity(deps.len() + extra_args.len());
            for dep in deps.iter() {
                if dep.trim().is_empty() {
                    args.push(Value::Null);
                    continue;
                }
                match lookup(dep.clone()).await? {
                    Some(value) => args.push(value),
                    None => {
                        return Err(ModuleError::DependencyMissing(format!(
                            "Required inject, \"{}\", is not available in the container.",
                            dep
                        )))
                    }
                }
            }
            args.extend(extra_args);
            descriptor(args).await
        })
    })
}

/// Evaluate `descriptor` on first use and cache its result.
///
/// A failed evaluation is not cached; the next call tries again.
pub fn lazy_singleton(descriptor: DiDescriptor) -> DiDescriptor {
    let cell: Arc<OnceCell<Value>> = Arc::new(OnceCell::new());
    Arc::new(move |args: Vec<Value>| {
        let cell = Arc::clone(&cell);
        let descriptor = Arc::clone(&descriptor);
        Box::pin(async move {
            cell.get_or_try_init(|| descriptor(args))
                .await
                .map(Value::clone)
        })
    })
}

/// Descriptor returning a fixed instance
pub fn singleton(instance: Value) -> DiDescriptor {
    Arc::new(move |_args: Vec<Value>| {
        let instance = instance.clone();
        Box::pin(async move { Ok(instance) })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_descriptor(counter: Arc<AtomicUsize>) -> DiDescriptor {
        Arc::new(move |_args| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Value::from(n as i64))
            })
        })
    }

    fn no_lookup() -> DependencyLookup {
        Arc::new(|_| Box::pin(async { Ok(None) }))
    }

    #[tokio::test]
    async fn test_lazy_singleton_evaluates_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let container = DiContainer::new();
        container.set("svc", lazy_singleton(counting_descriptor(counter.clone())));

        let a = container.get_dep("svc", vec![]).unwrap().await.unwrap();
        let b = container.get_dep("svc", vec![]).unwrap().await.unwrap();
        assert_eq!(a, Value::Number(1.0));
        assert_eq!(b, Value::Number(1.0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plain_descriptor_reevaluates() {
        let counter = Arc::new(AtomicUsize::new(0));
        let container = DiContainer::new();
        container.set("svc", counting_descriptor(counter.clone()));
        container.get_dep("svc", vec![]).unwrap().await.unwrap();
        container.get_dep("svc", vec![]).unwrap().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(container.get_dep("missing", vec![]).is_none());
    }

    #[tokio::test]
    async fn test_dedication_passes_deps_then_args() {
        let lookup: DependencyLookup = Arc::new(|name| {
            Box::pin(async move { Ok(Some(Value::String(format!("dep:{}", name)))) })
        });
        let descriptor: ComponentDescriptor = Arc::new(|args: Vec<Value>| {
            Box::pin(async move {
                let parts: Vec<String> = args
                    .iter()
                    .map(|a| a.as_str().unwrap_or("null").to_string())
                    .collect();
                Ok(Value::String(parts.join(",")))
            })
        });
        let dedicated = dedication(descriptor, vec!["a".into(), "".into(), "b".into()], lookup);
        let result = dedicated(vec![Value::from("extra")]).await.unwrap();
        assert_eq!(result, Value::from("dep:a,null,dep:b,extra"));
    }

    #[tokio::test]
    async fn test_dedication_missing_dep() {
        let descriptor: ComponentDescriptor = Arc::new(|_| Box::pin(async { Ok(Value::Null) }));
        let dedicated = dedication(descriptor, vec!["absent".into()], no_lookup());
        assert!(matches!(
            dedicated(vec![]).await,
            Err(ModuleError::DependencyMissing(_))
        ));
    }

    #[test]
    fn test_set_all_is_atomic() {
        let container = DiContainer::new();
        container.set("taken", singleton(Value::Null));
        let result = container.set_all(vec![
            ("fresh".to_string(), singleton(Value::Null)),
            ("taken".to_string(), singleton(Value::Null)),
        ]);
        assert!(matches!(result, Err(ModuleError::DuplicateComponent(_))));
        assert!(!container.contains("fresh"));
        assert_eq!(container.names(), vec!["taken".to_string()]);
    }
}
