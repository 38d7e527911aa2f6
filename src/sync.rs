//! Per-subscriber synchronization and diffing.
//!
//! Each subscriber gets one [`EndpointSync`] running on its own task. On
//! every tick it reads the shared cache entry for its host, decides by set
//! membership whether anything changed since the list it last pushed, and
//! publishes only on change. Equal-but-reordered address lists never trigger
//! a publish.
//!
//! Removal detection compares full set difference (an address present in the
//! last pushed list but absent now), which is strictly stronger than the
//! cardinality-drop heuristic it replaces: any shrink implies some address
//! was dropped, and same-size replacements are caught by the addition check.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::cache::HostCache;
use crate::error_handling::{ResolutionEvent, ResolutionStats};
use crate::scheduler::LookupScheduler;
use crate::sink::{Endpoint, EndpointSink, EndpointUpdate, ROUND_ROBIN_POLICY};

/// Bridges one cache entry to one subscriber.
pub(crate) struct EndpointSync {
    host: Arc<str>,
    port: Option<u16>,
    cache: Arc<HostCache>,
    sink: Arc<dyn EndpointSink>,
    stats: Arc<ResolutionStats>,
    debug_decisions: bool,
    last_pushed: Vec<IpAddr>,
}

impl EndpointSync {
    pub(crate) fn new(
        host: Arc<str>,
        port: Option<u16>,
        cache: Arc<HostCache>,
        sink: Arc<dyn EndpointSink>,
        stats: Arc<ResolutionStats>,
        debug_decisions: bool,
    ) -> Self {
        EndpointSync {
            host,
            port,
            cache,
            sink,
            stats,
            debug_decisions,
            last_pushed: Vec::new(),
        }
    }

    /// One sync tick: read the cache, diff, publish on change.
    async fn sync_once(&mut self) {
        let current = self.cache.get(&self.host).await.unwrap_or_default();
        self.apply(current);
    }

    /// Applies a freshly observed address set through the diff policy.
    ///
    /// Also used by the orchestrator for the initial resolve, which bypasses
    /// the cache so the subscriber holds a result before `watch` returns.
    pub(crate) fn apply(&mut self, current: Vec<IpAddr>) {
        let changed = has_additions(&current, &self.last_pushed)
            || has_removals(&current, &self.last_pushed);

        if !changed {
            self.stats.increment(ResolutionEvent::NoOpSync);
            if self.debug_decisions {
                debug!(
                    "No membership change for {}; keeping {} endpoint(s)",
                    self.host,
                    self.last_pushed.len()
                );
            }
            return;
        }

        let update = EndpointUpdate {
            endpoints: current
                .iter()
                .map(|ip| Endpoint::new(*ip, self.port, self.host.clone()))
                .collect(),
            policy: ROUND_ROBIN_POLICY,
        };

        if self.debug_decisions {
            debug!(
                "Publishing {} endpoint(s) for {} (was {})",
                current.len(),
                self.host,
                self.last_pushed.len()
            );
        }

        match self.sink.publish(update) {
            Ok(()) => self.stats.increment(ResolutionEvent::UpdatePublished),
            Err(e) => {
                // A rejected publish still advances the diff state; the next
                // membership change produces a fresh full list anyway.
                self.stats.increment(ResolutionEvent::EmitError);
                warn!("Subscriber for {} rejected endpoint update: {e}", self.host);
            }
        }
        self.last_pushed = current;
    }

    /// Runs the sync loop until cancelled. Ticks are strictly sequential;
    /// a nudge from [`Subscription::resolve_now`] triggers an out-of-band
    /// tick without overlapping a scheduled one.
    pub(crate) async fn run(
        mut self,
        sync_every: Duration,
        mut nudges: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(sync_every);
        // interval fires immediately; the initial resolve already ran, so
        // swallow the first tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sync_once().await,
                Some(()) = nudges.recv() => self.sync_once().await,
                _ = cancel.cancelled() => {
                    debug!("Sync loop for {} stopped", self.host);
                    return;
                }
            }
        }
    }
}

/// True when some address in `current` is absent from `last` (by value).
pub(crate) fn has_additions(current: &[IpAddr], last: &[IpAddr]) -> bool {
    current.iter().any(|ip| !last.contains(ip))
}

/// True when some address in `last` is absent from `current` (by value).
pub(crate) fn has_removals(current: &[IpAddr], last: &[IpAddr]) -> bool {
    last.iter().any(|ip| !current.contains(ip))
}

/// Subscriber handle for one watched target.
///
/// Returned by [`watch`](crate::EndpointResolver::watch). Dropping the handle
/// closes the subscription; [`close`](Subscription::close) does so explicitly
/// and is safe to call any number of times, before or after the sync task has
/// exited.
pub struct Subscription {
    host: Arc<str>,
    scheduler: Arc<LookupScheduler>,
    cancel: CancellationToken,
    nudge: mpsc::Sender<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("host", &self.host)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        host: Arc<str>,
        scheduler: Arc<LookupScheduler>,
        cancel: CancellationToken,
        nudge: mpsc::Sender<()>,
    ) -> Self {
        Subscription {
            host,
            scheduler,
            cancel,
            nudge,
            closed: AtomicBool::new(false),
        }
    }

    /// The hostname this subscription watches.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Requests an out-of-band sync tick instead of waiting for the next
    /// scheduled one. Fire-and-forget: failures are logged, never returned.
    pub fn resolve_now(&self) {
        match self.nudge.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                debug!("resolve_now for {}: a sync is already pending", self.host);
            }
            Err(TrySendError::Closed(())) => {
                debug!("resolve_now for {} ignored: subscription closed", self.host);
            }
        }
    }

    /// Stops the sync task and releases this subscriber's hold on the host's
    /// refresh task. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Subscription for {} already closed", self.host);
            return;
        }
        self.cancel.cancel();
        self.scheduler.release(&self.host).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        // Release must run async; outside a runtime (process teardown) the
        // scheduler tasks are going away with us, so skipping it is fine.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let scheduler = Arc::clone(&self.scheduler);
            let host = Arc::clone(&self.host);
            handle.spawn(async move { scheduler.release(&host).await });
        }
    }
}
