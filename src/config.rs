//! Engine configuration.
//!
//! Tunables for the resolution engine: how often the per-host lookup task
//! refreshes the cache, how often each subscriber sync task diffs against it,
//! and how long a single DNS call may run before it is abandoned.
//!
//! The engine never reads the environment on its own; whoever constructs an
//! [`EndpointResolver`](crate::EndpointResolver) builds a [`Settings`] value
//! (directly, via [`Settings::from_env`], or deserialized from a config file)
//! and injects it.

use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

// constants (used as defaults)
/// Default interval between cache refreshes for a watched host.
pub const DEFAULT_UPDATE_EVERY: Duration = Duration::from_secs(3);
/// Default interval between subscriber sync ticks.
pub const DEFAULT_SYNC_EVERY: Duration = Duration::from_secs(3);
/// Default bound on a single DNS lookup.
///
/// A hung resolver call must never stall a host's refresh cycle indefinitely,
/// so every call through the lookup primitive is wrapped in this timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

// Environment variable names recognized by `Settings::from_env`.
const ENV_UPDATE_EVERY: &str = "ENDPOINT_UPDATE_EVERY";
const ENV_SYNC_EVERY: &str = "ENDPOINT_SYNC_EVERY";
const ENV_LOOKUP_TIMEOUT: &str = "ENDPOINT_LOOKUP_TIMEOUT";
const ENV_DEBUG_DECISIONS: &str = "ENDPOINT_DEBUG_DECISIONS";

/// Tunables for the resolution engine.
///
/// All fields have working defaults; construct with struct-update syntax for
/// partial overrides:
///
/// ```
/// use endpoint_resolver::Settings;
/// use std::time::Duration;
///
/// let settings = Settings {
///     update_every: Duration::from_secs(5),
///     ..Default::default()
/// };
/// assert!(!settings.debug_decisions);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How often each host's background lookup task refreshes the cache.
    pub update_every: Duration,
    /// How often each subscriber's sync task diffs the cache against what it
    /// last pushed.
    pub sync_every: Duration,
    /// Upper bound on a single DNS lookup, applied around every call through
    /// the lookup primitive.
    pub lookup_timeout: Duration,
    /// When true, per-tick resolution decisions (including no-op syncs) are
    /// traced at debug level.
    pub debug_decisions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            update_every: DEFAULT_UPDATE_EVERY,
            sync_every: DEFAULT_SYNC_EVERY,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            debug_decisions: false,
        }
    }
}

impl Settings {
    /// Builds settings from environment variables, falling back to defaults
    /// for anything unset or unparsable.
    ///
    /// Recognized variables (durations are whole seconds):
    /// `ENDPOINT_UPDATE_EVERY`, `ENDPOINT_SYNC_EVERY`,
    /// `ENDPOINT_LOOKUP_TIMEOUT`, `ENDPOINT_DEBUG_DECISIONS`
    /// (`true`/`false`/`1`/`0`).
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Settings {
            update_every: env_duration(ENV_UPDATE_EVERY).unwrap_or(defaults.update_every),
            sync_every: env_duration(ENV_SYNC_EVERY).unwrap_or(defaults.sync_every),
            lookup_timeout: env_duration(ENV_LOOKUP_TIMEOUT).unwrap_or(defaults.lookup_timeout),
            debug_decisions: env_bool(ENV_DEBUG_DECISIONS).unwrap_or(defaults.debug_decisions),
        }
    }

    /// Replaces any zero duration with its default, warning per field.
    ///
    /// The interval timer panics on a zero period, and that panic would land
    /// inside a detached task: the refresh loop dies silently and the
    /// endpoint list goes permanently stale. A zero lookup timeout would
    /// abandon every DNS call before it starts.
    pub fn sanitized(mut self) -> Self {
        if self.update_every.is_zero() {
            log::warn!("update_every must be non-zero; using {DEFAULT_UPDATE_EVERY:?}");
            self.update_every = DEFAULT_UPDATE_EVERY;
        }
        if self.sync_every.is_zero() {
            log::warn!("sync_every must be non-zero; using {DEFAULT_SYNC_EVERY:?}");
            self.sync_every = DEFAULT_SYNC_EVERY;
        }
        if self.lookup_timeout.is_zero() {
            log::warn!("lookup_timeout must be non-zero; using {DEFAULT_LOOKUP_TIMEOUT:?}");
            self.lookup_timeout = DEFAULT_LOOKUP_TIMEOUT;
        }
        self
    }
}

fn env_duration(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            log::warn!("Ignoring {name}={raw}: expected a whole number of seconds");
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim() {
        "1" | "true" | "TRUE" | "True" => Some(true),
        "0" | "false" | "FALSE" | "False" => Some(false),
        _ => {
            log::warn!("Ignoring {name}={raw}: expected a boolean");
            None
        }
    }
}

/// Logging level for the demo binary.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace). Used with the `--log-level` CLI option.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// Everything, including per-tick traces
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors
    Plain,
    /// Structured JSON, one object per line
    Json,
}
