//! Per-host background refresh tasks.
//!
//! One refresh task per watched hostname, no matter how many subscribers
//! watch it. Registration is a check-and-start under a single mutex, so
//! concurrent subscribers racing to watch the same host can never start a
//! duplicate task. Each registration is reference counted; when the last
//! subscriber releases a host, its task is cancelled and its cache entry
//! evicted.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::HostCache;
use crate::error_handling::ResolutionStats;
use crate::lookup::{bounded_lookup, Lookup};

struct HostEntry {
    subscribers: usize,
    cancel: CancellationToken,
}

/// Starts, reference-counts, and stops the per-host refresh tasks.
pub(crate) struct LookupScheduler {
    cache: Arc<HostCache>,
    lookup: Arc<dyn Lookup>,
    update_every: Duration,
    lookup_timeout: Duration,
    stats: Arc<ResolutionStats>,
    hosts: Mutex<HashMap<Arc<str>, HostEntry>>,
}

impl LookupScheduler {
    pub(crate) fn new(
        cache: Arc<HostCache>,
        lookup: Arc<dyn Lookup>,
        update_every: Duration,
        lookup_timeout: Duration,
        stats: Arc<ResolutionStats>,
    ) -> Self {
        LookupScheduler {
            cache,
            lookup,
            update_every,
            lookup_timeout,
            stats,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a subscriber for a host, starting the refresh task if this
    /// is the host's first subscriber. Returns true when a task was started.
    ///
    /// The check-and-start runs entirely under the registration mutex, and
    /// the cache entry is seeded before the task spawns, so a concurrent
    /// registrant always observes the host as already started. `initial`
    /// seeds the entry only on first registration (it is the orchestrator's
    /// initial resolve result; later subscribers use whatever the running
    /// task has written since).
    pub(crate) async fn register(&self, host: &Arc<str>, initial: Vec<IpAddr>) -> bool {
        let mut hosts = self.hosts.lock().await;
        if let Some(entry) = hosts.get_mut(host.as_ref()) {
            entry.subscribers += 1;
            return false;
        }

        self.cache.register(host, initial).await;
        let cancel = CancellationToken::new();
        hosts.insert(
            Arc::clone(host),
            HostEntry {
                subscribers: 1,
                cancel: cancel.clone(),
            },
        );

        debug!("Starting refresh task for {host}");
        let task = RefreshTask {
            host: Arc::clone(host),
            cache: Arc::clone(&self.cache),
            lookup: Arc::clone(&self.lookup),
            lookup_timeout: self.lookup_timeout,
            stats: Arc::clone(&self.stats),
        };
        let update_every = self.update_every;
        tokio::spawn(async move { task.run(update_every, cancel).await });
        true
    }

    /// Releases one subscriber's hold on a host. At zero subscribers the
    /// refresh task is cancelled and the cache entry evicted.
    pub(crate) async fn release(&self, host: &str) {
        let mut hosts = self.hosts.lock().await;
        let Some(entry) = hosts.get_mut(host) else {
            debug!("Release for unregistered host {host} ignored");
            return;
        };
        entry.subscribers -= 1;
        if entry.subscribers == 0 {
            entry.cancel.cancel();
            hosts.remove(host);
            self.cache.remove(host).await;
            debug!("Stopped refresh task for {host} and evicted its cache entry");
        }
    }

    /// Number of subscribers currently registered for a host.
    pub(crate) async fn subscriber_count(&self, host: &str) -> usize {
        self.hosts
            .lock()
            .await
            .get(host)
            .map(|entry| entry.subscribers)
            .unwrap_or(0)
    }

    /// Number of hosts with a running refresh task.
    pub(crate) async fn active_hosts(&self) -> usize {
        self.hosts.lock().await.len()
    }
}

/// The per-host refresh loop: resolve immediately, then on every tick.
struct RefreshTask {
    host: Arc<str>,
    cache: Arc<HostCache>,
    lookup: Arc<dyn Lookup>,
    lookup_timeout: Duration,
    stats: Arc<ResolutionStats>,
}

impl RefreshTask {
    async fn run(self, update_every: Duration, cancel: CancellationToken) {
        self.refresh_once(&cancel).await;

        let mut ticker = tokio::time::interval(update_every);
        // The first interval tick fires immediately; the initial refresh
        // just ran, so swallow it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_once(&cancel).await,
                _ = cancel.cancelled() => {
                    debug!("Refresh task for {} cancelled", self.host);
                    return;
                }
            }
        }
    }

    async fn refresh_once(&self, cancel: &CancellationToken) {
        match bounded_lookup(self.lookup.as_ref(), &self.host, self.lookup_timeout).await {
            Ok(ips) => {
                // A release may have landed while the lookup was in flight;
                // writing now would resurrect the entry it just evicted.
                if cancel.is_cancelled() {
                    debug!("Dropping late lookup result for released host {}", self.host);
                    return;
                }
                debug!("Resolved {} to {} address(es)", self.host, ips.len());
                // An empty successful answer is written through: it means the
                // service legitimately has no endpoints right now.
                self.cache.set(&self.host, ips).await;
            }
            Err(e) => {
                // Keep the stale entry; last-known-good endpoints beat
                // telling every subscriber "no endpoints".
                self.stats.record_resolve_error(&e);
                warn!(
                    "Lookup for {} failed, keeping last known endpoints: {e}",
                    self.host
                );
            }
        }
    }
}
