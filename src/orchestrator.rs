//! Watch orchestration.
//!
//! [`EndpointResolver`] is the entry point: it owns the shared cache, the
//! refresh-task scheduler, and the lookup primitive, and wires a new
//! subscriber into all three. Resolvers are plain constructible values — two
//! resolvers share nothing, so tests (and embedders running several isolated
//! client stacks) each build their own instead of touching process state.

use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::HostCache;
use crate::config::Settings;
use crate::error_handling::{ResolutionStats, WatchError};
use crate::lookup::{bounded_lookup, HickoryLookup, Lookup};
use crate::scheduler::LookupScheduler;
use crate::sink::EndpointSink;
use crate::sync::{EndpointSync, Subscription};

/// Resolution engine handle: create one per client stack, then call
/// [`watch`](EndpointResolver::watch) once per connection target.
///
/// # Example
///
/// ```no_run
/// use endpoint_resolver::{EndpointResolver, EndpointSink, EndpointUpdate, Settings, SinkError};
/// use std::sync::Arc;
///
/// struct PrintSink;
///
/// impl EndpointSink for PrintSink {
///     fn publish(&self, update: EndpointUpdate) -> Result<(), SinkError> {
///         for endpoint in &update.endpoints {
///             println!("{} ({})", endpoint.address, endpoint.server_name);
///         }
///         Ok(())
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = EndpointResolver::new(Settings::default());
/// let subscription = resolver.watch("svc.local:50051", Arc::new(PrintSink)).await?;
/// // ... traffic flows, endpoint updates arrive in PrintSink ...
/// subscription.close().await;
/// # Ok(())
/// # }
/// ```
pub struct EndpointResolver {
    cache: Arc<HostCache>,
    scheduler: Arc<LookupScheduler>,
    lookup: Arc<dyn Lookup>,
    settings: Settings,
    stats: Arc<ResolutionStats>,
}

impl EndpointResolver {
    /// Creates a resolver that queries the system DNS configuration.
    pub fn new(settings: Settings) -> Self {
        let settings = settings.sanitized();
        let lookup = Arc::new(HickoryLookup::from_system_conf(settings.lookup_timeout));
        Self::with_lookup(settings, lookup)
    }

    /// Creates a resolver with an injected lookup primitive.
    pub fn with_lookup(settings: Settings, lookup: Arc<dyn Lookup>) -> Self {
        let settings = settings.sanitized();
        let cache = Arc::new(HostCache::new());
        let stats = Arc::new(ResolutionStats::new());
        let scheduler = Arc::new(LookupScheduler::new(
            Arc::clone(&cache),
            Arc::clone(&lookup),
            settings.update_every,
            settings.lookup_timeout,
            Arc::clone(&stats),
        ));
        EndpointResolver {
            cache,
            scheduler,
            lookup,
            settings,
            stats,
        }
    }

    /// Begins watching a connection target for a subscriber.
    ///
    /// Parses the target (`host` or `host:port`), performs one resolve so the
    /// subscriber holds an initial result before this returns, ensures the
    /// host's refresh task is running, and starts the subscriber's sync loop.
    ///
    /// # Errors
    ///
    /// [`WatchError::Parse`] for a malformed target and
    /// [`WatchError::Resolve`] when the initial resolve fails fatally
    /// (malformed hostname); in both cases nothing was registered. Transient
    /// initial failures (timeout, no records yet) are logged and reported to
    /// the sink, and the watch proceeds with an empty initial set — the
    /// refresh task self-heals on its next tick.
    pub async fn watch(
        &self,
        target: &str,
        sink: Arc<dyn EndpointSink>,
    ) -> Result<Subscription, WatchError> {
        let target: crate::Target = target.parse()?;
        let host: Arc<str> = Arc::from(target.host.as_str());

        let mut sync = EndpointSync::new(
            Arc::clone(&host),
            target.port,
            Arc::clone(&self.cache),
            Arc::clone(&sink),
            Arc::clone(&self.stats),
            self.settings.debug_decisions,
        );

        // Initial resolve, so the first result exists before we return. The
        // result also seeds the cache entry on first registration, keeping
        // what the subscriber saw and what the sync loop will diff against
        // consistent until the refresh task's first write.
        let initial = match bounded_lookup(
            self.lookup.as_ref(),
            &host,
            self.settings.lookup_timeout,
        )
        .await
        {
            Ok(ips) => ips,
            Err(e) if e.is_fatal() => {
                return Err(WatchError::Resolve {
                    host: host.to_string(),
                    source: e,
                });
            }
            Err(e) => {
                self.stats.record_resolve_error(&e);
                warn!("Initial resolve of {host} failed, starting with no endpoints: {e}");
                sink.report_error(&e);
                Vec::new()
            }
        };
        sync.apply(initial.clone());

        self.scheduler.register(&host, initial).await;

        let cancel = CancellationToken::new();
        let (nudge_tx, nudge_rx) = mpsc::channel(1);
        tokio::spawn(sync.run(self.settings.sync_every, nudge_rx, cancel.clone()));

        Ok(Subscription::new(
            host,
            Arc::clone(&self.scheduler),
            cancel,
            nudge_tx,
        ))
    }

    /// Event counters shared by everything this resolver spawned.
    pub fn stats(&self) -> Arc<ResolutionStats> {
        Arc::clone(&self.stats)
    }

    /// Number of hosts with a running refresh task.
    pub async fn active_hosts(&self) -> usize {
        self.scheduler.active_hosts().await
    }

    /// Number of open subscriptions for one host.
    pub async fn subscriber_count(&self, host: &str) -> usize {
        self.scheduler.subscriber_count(host).await
    }
}
