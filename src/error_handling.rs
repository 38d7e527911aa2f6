//! Error types and resolution event statistics.
//!
//! Parse failures are the only errors surfaced synchronously to callers;
//! everything that happens on a background tick (failed lookups, rejected
//! publishes) is logged and counted here instead of being propagated, so a
//! transient DNS failure can never take a subscriber down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::SetLoggerError;
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error initializing the engine's ambient pieces (currently the logger).
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Malformed connection-target string.
///
/// The accepted grammar is `host` or `host:port`. These errors are fatal and
/// surfaced synchronously from [`watch`](crate::EndpointResolver::watch);
/// nothing is created and no DNS call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetParseError {
    /// The target string (or its host segment) was empty.
    #[error("invalid target: empty host")]
    EmptyHost,
    /// More than one `:` separator.
    #[error("invalid target endpoint \"{0}\": expected host or host:port")]
    TooManySegments(String),
    /// The port segment did not parse as a port number.
    #[error("invalid port \"{port}\" in target \"{target}\"")]
    InvalidPort {
        /// The full target string as given.
        target: String,
        /// The offending port token.
        port: String,
    },
}

/// A DNS lookup that did not produce an address list.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The hostname is not a well-formed DNS name. The only fatal variant:
    /// retrying can never succeed.
    #[error("invalid hostname \"{0}\"")]
    InvalidHostname(String),
    /// The lookup exceeded the configured bound.
    #[error("DNS lookup for {host} timed out after {limit:?}")]
    Timeout {
        /// Host being resolved.
        host: String,
        /// The bound that was exceeded.
        limit: Duration,
    },
    /// The name exists but returned no address records.
    #[error("no address records found for {0}")]
    NoRecords(String),
    /// Any other resolver failure (server unreachable, SERVFAIL, ...).
    #[error("DNS lookup failed: {0}")]
    Lookup(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ResolveError {
    /// True when retrying can never succeed and the failure should be
    /// propagated to the caller instead of waiting for the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolveError::InvalidHostname(_))
    }
}

/// The subscriber's update sink rejected a publish.
///
/// Never fatal: the failed update is logged and counted, and the diff state
/// advances as if it had been delivered.
#[derive(Error, Debug)]
#[error("subscriber rejected endpoint update: {0}")]
pub struct SinkError(#[from] Box<dyn std::error::Error + Send + Sync>);

impl SinkError {
    /// Wraps any error type as a sink rejection.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        SinkError(source.into())
    }
}

/// Failure to begin watching a target.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The target string was malformed.
    #[error(transparent)]
    Parse(#[from] TargetParseError),
    /// The initial resolve failed fatally (malformed hostname).
    #[error("initial resolve of {host} failed: {source}")]
    Resolve {
        /// Host from the parsed target.
        host: String,
        /// The underlying fatal resolve failure.
        #[source]
        source: ResolveError,
    },
}

/// Events counted by [`ResolutionStats`].
///
/// Covers both failure modes and normal decisions, so operators can see at a
/// glance whether an engine is churning (lots of publishes), healthy-idle
/// (lots of no-op syncs), or degraded (lookup errors climbing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ResolutionEvent {
    /// A DNS lookup failed (the stale cache entry was retained).
    LookupError,
    /// A DNS lookup exceeded the configured bound.
    LookupTimeout,
    /// A subscriber sink rejected a publish.
    EmitError,
    /// A sync tick found no membership change and did nothing.
    NoOpSync,
    /// An endpoint update was delivered to a subscriber.
    UpdatePublished,
}

impl ResolutionEvent {
    /// Human-readable label used in log summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionEvent::LookupError => "DNS lookup error",
            ResolutionEvent::LookupTimeout => "DNS lookup timeout",
            ResolutionEvent::EmitError => "Subscriber emit error",
            ResolutionEvent::NoOpSync => "No-op sync tick",
            ResolutionEvent::UpdatePublished => "Endpoint update published",
        }
    }
}

/// Thread-safe resolution event counters.
///
/// Tracks the count of each [`ResolutionEvent`] using atomic counters,
/// allowing concurrent access from every scheduler and sync task sharing the
/// engine. All counters are initialized to zero on creation.
pub struct ResolutionStats {
    events: HashMap<ResolutionEvent, AtomicUsize>,
}

impl ResolutionStats {
    /// Creates a tracker with all counters at zero.
    pub fn new() -> Self {
        let mut events = HashMap::new();
        for event in ResolutionEvent::iter() {
            events.insert(event, AtomicUsize::new(0));
        }
        ResolutionStats { events }
    }

    /// Increments the counter for one event.
    pub fn increment(&self, event: ResolutionEvent) {
        // All ResolutionEvent variants are initialized in new(), so unwrap() is safe
        self.events
            .get(&event)
            .unwrap()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current count for one event.
    pub fn get_count(&self, event: ResolutionEvent) -> usize {
        // All ResolutionEvent variants are initialized in new(), so unwrap() is safe
        self.events.get(&event).unwrap().load(Ordering::SeqCst)
    }

    /// Records a resolve failure under the matching counter.
    pub fn record_resolve_error(&self, error: &ResolveError) {
        let event = match error {
            ResolveError::Timeout { .. } => ResolutionEvent::LookupTimeout,
            _ => ResolutionEvent::LookupError,
        };
        self.increment(event);
    }

    /// Logs all non-zero counters at info level.
    pub fn log_totals(&self) {
        for event in ResolutionEvent::iter() {
            let count = self.get_count(event);
            if count > 0 {
                log::info!("{}: {}", event.as_str(), count);
            }
        }
    }
}

impl Default for ResolutionStats {
    fn default() -> Self {
        Self::new()
    }
}
