//! Subscriber-facing update interface.
//!
//! The engine hands resolved endpoint lists to the outside world through the
//! [`EndpointSink`] trait. A sink is typically a thin adapter around a client
//! library's connection-state callback; the engine knows nothing about what
//! the subscriber does with the list beyond the fixed round-robin policy hint
//! it always attaches.

use std::net::IpAddr;
use std::sync::Arc;

use crate::error_handling::{ResolveError, SinkError};

/// Load-balancing policy directive attached to every update. The engine never
/// varies this value.
pub const ROUND_ROBIN_POLICY: &str = "round_robin";

/// One resolved endpoint as handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `ip` or `ip:port` when the subscription carries a fixed port.
    pub address: String,
    /// Logical server identity: the watched hostname, used by subscribers for
    /// verification, not for routing.
    pub server_name: Arc<str>,
}

impl Endpoint {
    /// Formats an endpoint from a resolved address and an optional fixed port.
    pub fn new(ip: IpAddr, port: Option<u16>, server_name: Arc<str>) -> Self {
        let address = match port {
            Some(port) => format!("{ip}:{port}"),
            None => ip.to_string(),
        };
        Endpoint {
            address,
            server_name,
        }
    }
}

/// A full endpoint-list update for one subscriber.
///
/// The endpoint order matches the order the resolver returned; the engine
/// compares lists by membership but preserves order on emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUpdate {
    /// The complete current endpoint list (not a delta).
    pub endpoints: Vec<Endpoint>,
    /// Always [`ROUND_ROBIN_POLICY`].
    pub policy: &'static str,
}

/// Receives endpoint updates for one watched hostname.
///
/// Implementations must be cheap and non-blocking; `publish` is called from
/// the subscription's sync task.
pub trait EndpointSink: Send + Sync + 'static {
    /// Delivers a new endpoint list.
    ///
    /// A rejection is logged and counted by the engine but never retried: the
    /// diff state advances as if the update had been delivered, and the next
    /// membership change produces a fresh publish.
    fn publish(&self, update: EndpointUpdate) -> Result<(), SinkError>;

    /// Notifies the subscriber of a resolution error that did not produce an
    /// update (for example the initial resolve timing out). Informational
    /// only; the engine keeps running either way.
    fn report_error(&self, error: &ResolveError) {
        log::error!("resolution error reported to subscriber: {error}");
    }
}
