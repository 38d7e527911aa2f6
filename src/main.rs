//! Demo CLI binary.
//!
//! This is a thin wrapper around the `endpoint_resolver` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Printing endpoint updates as they arrive
//!
//! All core functionality is implemented in the library crate.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use endpoint_resolver::logging::init_logger_with;
use endpoint_resolver::{
    EndpointResolver, EndpointSink, EndpointUpdate, LogFormat, LogLevel, ResolveError, Settings,
    SinkError,
};

/// Watches connection targets and prints every endpoint-list change.
#[derive(Debug, Parser)]
#[command(
    name = "endpoint_resolver",
    about = "Watches service hostnames and prints endpoint-list changes."
)]
struct Opt {
    /// Targets to watch (`host` or `host:port`)
    #[arg(value_parser, required = true)]
    targets: Vec<String>,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// Seconds between DNS refreshes per host (overrides ENDPOINT_UPDATE_EVERY)
    #[arg(long)]
    update_every: Option<u64>,

    /// Seconds between subscriber sync ticks (overrides ENDPOINT_SYNC_EVERY)
    #[arg(long)]
    sync_every: Option<u64>,

    /// Trace every resolution decision, including no-op ticks
    #[arg(long)]
    debug_decisions: bool,
}

/// Sink that prints each update to stdout.
struct PrintSink {
    target: String,
}

impl EndpointSink for PrintSink {
    fn publish(&self, update: EndpointUpdate) -> Result<(), SinkError> {
        if update.endpoints.is_empty() {
            println!("{}: no endpoints", self.target);
            return Ok(());
        }
        for endpoint in &update.endpoints {
            println!(
                "{}: {} (server name {}, policy {})",
                self.target, endpoint.address, endpoint.server_name, update.policy
            );
        }
        Ok(())
    }

    fn report_error(&self, error: &ResolveError) {
        log::warn!("{}: resolution error: {error}", self.target);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    let mut settings = Settings::from_env();
    if let Some(secs) = opt.update_every {
        settings.update_every = Duration::from_secs(secs);
    }
    if let Some(secs) = opt.sync_every {
        settings.sync_every = Duration::from_secs(secs);
    }
    settings.debug_decisions |= opt.debug_decisions;

    let resolver = EndpointResolver::new(settings);

    let mut subscriptions = Vec::new();
    for target in &opt.targets {
        let sink = Arc::new(PrintSink {
            target: target.clone(),
        });
        match resolver.watch(target, sink).await {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => {
                eprintln!("endpoint_resolver error: {e:#}");
                process::exit(1);
            }
        }
    }

    info!(
        "Watching {} target(s); press Ctrl-C to stop",
        subscriptions.len()
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;

    for subscription in &subscriptions {
        subscription.close().await;
    }
    resolver.stats().log_totals();

    Ok(())
}
