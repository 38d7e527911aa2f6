//! endpoint_resolver library: client-side DNS endpoint resolution engine
//!
//! Resolves a logical service hostname (typically a headless cluster-internal
//! service) into a live set of network endpoints and keeps that set fresh for
//! a client-side connection layer that load-balances across it. One
//! background task per watched hostname polls DNS into a shared cache; one
//! task per subscriber diffs the cache against what it last pushed and
//! publishes only on membership change.
//!
//! # Example
//!
//! ```no_run
//! use endpoint_resolver::{EndpointResolver, EndpointSink, EndpointUpdate, Settings, SinkError};
//! use std::sync::Arc;
//!
//! struct MySink;
//!
//! impl EndpointSink for MySink {
//!     fn publish(&self, update: EndpointUpdate) -> Result<(), SinkError> {
//!         println!("{} endpoints, policy {}", update.endpoints.len(), update.policy);
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = EndpointResolver::new(Settings::from_env());
//! let subscription = resolver.watch("my-svc.my-ns.svc:50051", Arc::new(MySink)).await?;
//! subscription.resolve_now(); // out-of-band refresh
//! subscription.close().await; // idempotent
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

mod cache;
pub mod config;
mod error_handling;
pub mod logging;
mod lookup;
mod orchestrator;
mod scheduler;
mod sink;
mod sync;
mod target;

// Re-export public API
pub use config::{LogFormat, LogLevel, Settings};
pub use error_handling::{
    InitializationError, ResolutionEvent, ResolutionStats, ResolveError, SinkError,
    TargetParseError, WatchError,
};
pub use lookup::{HickoryLookup, Lookup};
pub use orchestrator::EndpointResolver;
pub use sink::{Endpoint, EndpointSink, EndpointUpdate, ROUND_ROBIN_POLICY};
pub use sync::Subscription;
pub use target::Target;
