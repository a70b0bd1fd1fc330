//! Lock utilities
//!
//! Synchronous state (routes, pending requests, reference graphs) lives behind
//! `std::sync` locks that are never held across an await point. These helpers
//! recover the guard from a poisoned lock instead of panicking: the protected
//! state is plain bookkeeping that stays consistent between statements.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Acquire a mutex, recovering from poisoning
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Recovering poisoned mutex");
        poisoned.into_inner()
    })
}

/// Acquire a read lock, recovering from poisoning
pub fn read<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(|poisoned| {
        warn!("Recovering poisoned read lock");
        poisoned.into_inner()
    })
}

/// Acquire a write lock, recovering from poisoning
pub fn write<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(|poisoned| {
        warn!("Recovering poisoned write lock");
        poisoned.into_inner()
    })
}
