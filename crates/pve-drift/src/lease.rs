use std::collections::HashMap;
use std::sync::Arc;

use pve_core::ResourceCategory;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key exclusive leases, acquired before any write to a resource.
///
/// Keys are `<category>/<id>` for resources; callers may lease other
/// namespaces (e.g. `environment/production`). Lease maps grow with the set
/// of keys ever touched, which is bounded by the managed inventory.
#[derive(Debug, Default)]
pub struct ResourceLeases {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held lease. Released on drop.
#[derive(Debug)]
pub struct Lease {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ResourceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_key(category: ResourceCategory, id: &str) -> String {
        format!("{category}/{id}")
    }

    /// Wait until the lease for `key` is free, then hold it.
    pub async fn acquire(&self, key: impl Into<String>) -> Lease {
        let key = key.into();
        let lock = self.lock_for(&key).await;
        let guard = lock.lock_owned().await;
        tracing::trace!(key = %key, "lease acquired");
        Lease { key, _guard: guard }
    }

    /// Take the lease for `key` only if nobody holds it.
    pub async fn try_acquire(&self, key: impl Into<String>) -> Option<Lease> {
        let key = key.into();
        let lock = self.lock_for(&key).await;
        let guard = lock.try_lock_owned().ok()?;
        Some(Lease { key, _guard: guard })
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_is_refused_until_release() {
        let leases = ResourceLeases::new();
        let key = ResourceLeases::resource_key(ResourceCategory::Vm, "100");
        assert_eq!(key, "vm/100");

        let held = leases.acquire(key.clone()).await;
        assert!(leases.try_acquire(key.clone()).await.is_none());
        assert!(leases.try_acquire("vm/101").await.is_some());

        drop(held);
        let again = leases.try_acquire(key).await.unwrap();
        assert_eq!(again.key(), "vm/100");
    }
}
