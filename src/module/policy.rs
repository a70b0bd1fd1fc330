//! Module loading policies
//!
//! A policy is asked twice per unit: once with the bare name before the unit
//! is touched, and again with the full [`ModuleInfo`] once it is known.

use async_trait::async_trait;

use crate::module::manager::ModuleManager;
use crate::module::traits::ModuleInfo;
use crate::utils::version::Version;

/// What the policy is asked about
#[derive(Debug, Clone, Copy)]
pub enum ModuleCandidate<'a> {
    Name(&'a str),
    Info(&'a ModuleInfo),
}

#[async_trait]
pub trait ModuleLoadingPolicy: Send + Sync {
    async fn should_load(&self, manager: &ModuleManager, candidate: ModuleCandidate<'_>) -> bool;
}

/// Accepts every name, and every module whose `host_version` is absent or a
/// valid version. Whether that version is satisfied is left to the manager's
/// version gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultModuleLoadingPolicy;

#[async_trait]
impl ModuleLoadingPolicy for DefaultModuleLoadingPolicy {
    async fn should_load(&self, _manager: &ModuleManager, candidate: ModuleCandidate<'_>) -> bool {
        match candidate {
            ModuleCandidate::Name(_) => true,
            ModuleCandidate::Info(info) => info
                .host_version
                .as_deref()
                .map(Version::is_valid)
                .unwrap_or(true),
        }
    }
}

/// Only loads modules declaring exactly the manager's host version
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactHostVersionPolicy;

#[async_trait]
impl ModuleLoadingPolicy for ExactHostVersionPolicy {
    async fn should_load(&self, manager: &ModuleManager, candidate: ModuleCandidate<'_>) -> bool {
        match candidate {
            ModuleCandidate::Name(_) => true,
            ModuleCandidate::Info(info) => {
                info.host_version.as_deref() == Some(manager.host_version())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_policy() {
        let manager = ModuleManager::new("1.0.0", None).unwrap();
        let policy = DefaultModuleLoadingPolicy;
        assert!(policy.should_load(&manager, ModuleCandidate::Name("x")).await);

        let info = ModuleInfo::new("x", "1.0.0");
        assert!(policy.should_load(&manager, ModuleCandidate::Info(&info)).await);
        let info = ModuleInfo::new("x", "1.0.0").host_version("9.0.0");
        assert!(policy.should_load(&manager, ModuleCandidate::Info(&info)).await);
        let info = ModuleInfo::new("x", "1.0.0").host_version("latest");
        assert!(!policy.should_load(&manager, ModuleCandidate::Info(&info)).await);
    }

    #[tokio::test]
    async fn test_exact_host_version_policy() {
        let manager = ModuleManager::new("1.0.0", None).unwrap();
        let policy = ExactHostVersionPolicy;
        let matching = ModuleInfo::new("x", "1.0.0").host_version("1.0.0");
        let other = ModuleInfo::new("x", "1.0.0").host_version("1.1.0");
        assert!(policy.should_load(&manager, ModuleCandidate::Info(&matching)).await);
        assert!(!policy.should_load(&manager, ModuleCandidate::Info(&other)).await);
        assert!(!policy.should_load(&manager, ModuleCandidate::Info(&ModuleInfo::new("x", "1.0.0"))).await);
    }
}
