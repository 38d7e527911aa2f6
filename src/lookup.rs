//! DNS lookup primitive.
//!
//! The engine only ever needs one operation from DNS: "give me every address
//! this name currently resolves to". That operation is behind the [`Lookup`]
//! trait so tests (and embedders with their own resolver plumbing) can inject
//! a deterministic implementation; production uses [`HickoryLookup`].

use std::net::IpAddr;
use std::time::Duration;

use futures::future::BoxFuture;
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::Name;
use hickory_resolver::TokioAsyncResolver;

use crate::error_handling::ResolveError;

/// Injectable DNS resolution primitive.
pub trait Lookup: Send + Sync + 'static {
    /// Resolves a hostname to all of its current addresses.
    ///
    /// An `Ok(vec![])` is a legitimate result (a headless service with no
    /// ready pods), distinct from [`ResolveError::NoRecords`], which is how
    /// resolvers that error on empty answers surface the same situation.
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>>;
}

/// Runs one lookup with the engine-level time bound applied.
///
/// The bound is enforced here rather than trusted to the [`Lookup`]
/// implementation, so a hung resolver can never stall a refresh cycle.
pub(crate) async fn bounded_lookup(
    lookup: &dyn Lookup,
    host: &str,
    limit: Duration,
) -> Result<Vec<IpAddr>, ResolveError> {
    match tokio::time::timeout(limit, lookup.lookup(host)).await {
        Ok(result) => result,
        Err(_) => Err(ResolveError::Timeout {
            host: host.to_string(),
            limit,
        }),
    }
}

/// [`Lookup`] implementation backed by a `hickory-resolver` async resolver.
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
    query_timeout: Duration,
}

impl HickoryLookup {
    /// Creates a resolver from the system configuration (`resolv.conf`),
    /// which is what resolves cluster-internal headless service names.
    ///
    /// Falls back to the default public-DNS configuration when no usable
    /// system configuration exists (some minimal containers), with `query_timeout`
    /// and reduced retry attempts applied so queries fail fast.
    pub fn from_system_conf(query_timeout: Duration) -> Self {
        use hickory_resolver::config::{ResolverConfig, ResolverOpts};

        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                log::warn!(
                    "Failed to read system resolver configuration ({e}); \
                     falling back to default resolver configuration"
                );
                let mut opts = ResolverOpts::default();
                opts.timeout = query_timeout;
                opts.attempts = 2; // Reduce retry attempts to fail faster
                TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
            }
        };

        HickoryLookup {
            resolver,
            query_timeout,
        }
    }
}

impl Lookup for HickoryLookup {
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>> {
        Box::pin(async move {
            // Reject malformed names before they reach the wire; this is the
            // one failure callers treat as fatal rather than retryable.
            if host.is_empty() || host.chars().any(char::is_whitespace) || Name::from_utf8(host).is_err()
            {
                return Err(ResolveError::InvalidHostname(host.to_string()));
            }

            match self.resolver.lookup_ip(host).await {
                Ok(response) => Ok(response.iter().collect()),
                Err(e) => match e.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => {
                        Err(ResolveError::NoRecords(host.to_string()))
                    }
                    ResolveErrorKind::Timeout => Err(ResolveError::Timeout {
                        host: host.to_string(),
                        limit: self.query_timeout,
                    }),
                    _ => Err(ResolveError::Lookup(Box::new(e))),
                },
            }
        })
    }
}
