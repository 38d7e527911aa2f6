//! Shared host-to-addresses cache.
//!
//! One cache is shared by every scheduler and sync task created from the same
//! [`EndpointResolver`](crate::EndpointResolver). Each entry has exactly one
//! writer (its host's refresh task); readers are the sync tasks of every
//! subscriber watching that host. Entries are replaced whole under the write
//! lock, so a reader can never observe a partially updated address list.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::RwLock;

/// In-memory map from watched hostname to its most recently resolved
/// addresses.
#[derive(Debug, Default)]
pub(crate) struct HostCache {
    hosts: RwLock<HashMap<Arc<str>, Vec<IpAddr>>>,
}

impl HostCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current addresses for a host, or `None` if the host was never
    /// registered. A registered host with no endpoints yields `Some(vec![])`,
    /// which is distinct: it means a lookup legitimately returned nothing.
    pub(crate) async fn get(&self, host: &str) -> Option<Vec<IpAddr>> {
        self.hosts.read().await.get(host).cloned()
    }

    /// Replaces the entry for a host. Only the host's refresh task calls this.
    pub(crate) async fn set(&self, host: &Arc<str>, ips: Vec<IpAddr>) {
        self.hosts.write().await.insert(host.clone(), ips);
    }

    /// Registers a host, seeding its entry. Does not clobber an existing
    /// entry: registration can race with the refresh task's first write.
    pub(crate) async fn register(&self, host: &Arc<str>, initial: Vec<IpAddr>) {
        self.hosts
            .write()
            .await
            .entry(host.clone())
            .or_insert(initial);
    }

    /// Evicts a host's entry once its last subscriber is gone.
    pub(crate) async fn remove(&self, host: &str) {
        self.hosts.write().await.remove(host);
    }
}
