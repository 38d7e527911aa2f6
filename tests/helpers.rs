// Shared test helpers: a controllable DNS lookup and a recording sink.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use endpoint_resolver::{
    EndpointSink, EndpointUpdate, Lookup, ResolveError, Settings, SinkError,
};

/// Shorthand for a 10.0.0.x test address.
#[allow(dead_code)] // Used by other test files
pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

/// Settings with short, distinct intervals so paused-clock tests can order
/// refresh ticks (2s) and sync ticks (3s) deterministically.
#[allow(dead_code)]
pub fn test_settings() -> Settings {
    Settings {
        update_every: Duration::from_secs(2),
        sync_every: Duration::from_secs(3),
        lookup_timeout: Duration::from_secs(10),
        debug_decisions: true,
    }
}

/// One canned answer a [`MockLookup`] can produce.
#[derive(Debug, Clone)]
pub enum MockAnswer {
    Addrs(Vec<IpAddr>),
    NoRecords,
    Timeout,
    InvalidHostname,
}

impl MockAnswer {
    fn to_result(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        match self {
            MockAnswer::Addrs(ips) => Ok(ips.clone()),
            MockAnswer::NoRecords => Err(ResolveError::NoRecords(host.to_string())),
            MockAnswer::Timeout => Err(ResolveError::Timeout {
                host: host.to_string(),
                limit: Duration::from_secs(10),
            }),
            MockAnswer::InvalidHostname => Err(ResolveError::InvalidHostname(host.to_string())),
        }
    }
}

/// Deterministic in-memory DNS.
///
/// Per host, scripted answers (consumed once, in order) take precedence over
/// the standing answer; a host with neither resolves to "no records". Every
/// call is counted.
pub struct MockLookup {
    standing: Mutex<HashMap<String, MockAnswer>>,
    scripts: Mutex<HashMap<String, VecDeque<MockAnswer>>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(MockLookup {
            standing: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Sets the standing answer for a host.
    pub fn set(&self, host: &str, answer: MockAnswer) {
        self.standing
            .lock()
            .unwrap()
            .insert(host.to_string(), answer);
    }

    /// Queues answers consumed one per lookup before the standing answer.
    pub fn push_script(&self, host: &str, answers: Vec<MockAnswer>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .extend(answers);
    }

    /// Total lookups performed across all hosts.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Lookup for MockLookup {
    fn lookup<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(queue) = self.scripts.lock().unwrap().get_mut(host) {
                if let Some(answer) = queue.pop_front() {
                    return answer.to_result(host);
                }
            }
            match self.standing.lock().unwrap().get(host) {
                Some(answer) => answer.to_result(host),
                None => Err(ResolveError::NoRecords(host.to_string())),
            }
        })
    }
}

/// Sink that records every publish and reported error.
pub struct RecordingSink {
    updates: Mutex<Vec<EndpointUpdate>>,
    errors: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingSink {
            updates: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        })
    }

    pub fn updates(&self) -> Vec<EndpointUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn addresses(&self) -> Vec<Vec<String>> {
        self.updates()
            .iter()
            .map(|u| u.endpoints.iter().map(|e| e.address.clone()).collect())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl EndpointSink for RecordingSink {
    fn publish(&self, update: EndpointUpdate) -> Result<(), SinkError> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }

    fn report_error(&self, error: &ResolveError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}
