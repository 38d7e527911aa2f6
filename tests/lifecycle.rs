//! Subscription and refresh-task lifecycle.
//!
//! Covers the invariants that only show up with several subscribers and
//! hosts on one resolver: a single refresh task per host no matter how many
//! subscribers race to watch it, per-host cache isolation, reference-counted
//! shutdown with cache eviction, and the idempotent close / post-close
//! behavior of subscription handles.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use helpers::{ip, test_settings, MockAnswer, MockLookup, RecordingSink};

use endpoint_resolver::{EndpointResolver, Settings};

#[tokio::test(start_paused = true)]
async fn concurrent_watches_share_one_refresh_task() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns.clone());

    let sinks: Vec<_> = (0..8).map(|_| RecordingSink::new()).collect();
    let watches = sinks
        .iter()
        .map(|sink| resolver.watch("svc.local:50051", sink.clone()));
    let subscriptions: Vec<_> = join_all(watches)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("all watches succeed");

    assert_eq!(subscriptions.len(), 8);
    assert_eq!(resolver.active_hosts().await, 1);
    assert_eq!(resolver.subscriber_count("svc.local").await, 8);

    // Every subscriber got its own initial publish.
    for sink in &sinks {
        assert_eq!(sink.updates().len(), 1);
    }

    // Before the first refresh tick at t=2s: one initial resolve per watch
    // plus exactly one immediate refresh from the single scheduler task.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(dns.calls(), 9);
}

#[tokio::test(start_paused = true)]
async fn hosts_are_isolated() {
    let dns = MockLookup::new();
    dns.set("x.local", MockAnswer::Addrs(vec![ip(1)]));
    dns.set("y.local", MockAnswer::Addrs(vec![ip(2)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns.clone());

    let sink_x = RecordingSink::new();
    let sink_y = RecordingSink::new();
    let _sub_x = resolver.watch("x.local:50051", sink_x.clone()).await.unwrap();
    let _sub_y = resolver.watch("y.local:50051", sink_y.clone()).await.unwrap();
    assert_eq!(resolver.active_hosts().await, 2);

    // x.local churns; y.local stays put.
    dns.set("x.local", MockAnswer::Addrs(vec![ip(1), ip(3)]));
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert!(sink_x.updates().len() >= 2);
    assert_eq!(sink_y.updates().len(), 1);
    assert_eq!(sink_y.addresses()[0], vec!["10.0.0.2:50051".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn last_close_stops_refresh_and_evicts_cache() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns.clone());

    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let sub_a = resolver.watch("svc.local", sink_a.clone()).await.unwrap();
    let sub_b = resolver.watch("svc.local", sink_b.clone()).await.unwrap();
    // Let the refresh task's immediate lookup land before counting calls.
    tokio::time::sleep(Duration::from_millis(10)).await;

    sub_a.close().await;
    assert_eq!(resolver.active_hosts().await, 1);
    assert_eq!(resolver.subscriber_count("svc.local").await, 1);

    sub_b.close().await;
    assert_eq!(resolver.active_hosts().await, 0);
    assert_eq!(resolver.subscriber_count("svc.local").await, 0);

    // No lookups once the refresh task is gone.
    let calls_at_close = dns.calls();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(dns.calls(), calls_at_close);
}

#[tokio::test(start_paused = true)]
async fn close_is_idempotent() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns);

    let sink = RecordingSink::new();
    let subscription = resolver.watch("svc.local", sink.clone()).await.unwrap();

    subscription.close().await;
    subscription.close().await;
    subscription.close().await;
    // A double close must not underflow another subscriber's refcount.
    assert_eq!(resolver.active_hosts().await, 0);
}

#[tokio::test(start_paused = true)]
async fn resolve_now_after_close_is_a_logged_noop() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns);

    let sink = RecordingSink::new();
    let subscription = resolver.watch("svc.local", sink.clone()).await.unwrap();
    subscription.close().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    subscription.resolve_now(); // must not panic or publish
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn resolve_now_triggers_out_of_band_sync() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    // Refresh quickly, but sync only once an hour: without a nudge the
    // subscriber would not hear about changes for a long time.
    let settings = Settings {
        update_every: Duration::from_secs(1),
        sync_every: Duration::from_secs(3600),
        ..test_settings()
    };
    let resolver = EndpointResolver::with_lookup(settings, dns.clone());

    let sink = RecordingSink::new();
    let subscription = resolver.watch("svc.local:50051", sink.clone()).await.unwrap();
    assert_eq!(sink.updates().len(), 1);

    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1), ip(2)]));
    tokio::time::sleep(Duration::from_secs(2)).await; // refresh picks it up

    subscription.resolve_now();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let addresses = sink.addresses();
    assert_eq!(addresses.len(), 2);
    assert_eq!(
        addresses[1],
        vec!["10.0.0.1:50051".to_string(), "10.0.0.2:50051".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_releases_the_host() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns);

    let sink = RecordingSink::new();
    let subscription = resolver.watch("svc.local", sink.clone()).await.unwrap();
    assert_eq!(resolver.active_hosts().await, 1);

    drop(subscription);
    // Drop releases via a spawned task; give it a beat.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(resolver.active_hosts().await, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_intervals_fall_back_to_defaults() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    // A zero period would panic the interval timer inside the detached
    // refresh task and silently freeze the endpoint list.
    let settings = Settings {
        update_every: Duration::ZERO,
        sync_every: Duration::ZERO,
        lookup_timeout: Duration::ZERO,
        ..test_settings()
    };
    let resolver = EndpointResolver::with_lookup(settings, dns.clone());

    let sink = RecordingSink::new();
    let _sub = resolver.watch("svc.local", sink.clone()).await.unwrap();

    // With the default 3s refresh interval, 30s means the refresh task is
    // alive and ticking well past its first lookup.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(dns.calls() >= 10);

    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1), ip(2)]));
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(sink.updates().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn subscription_debug_names_the_host() {
    let dns = MockLookup::new();
    dns.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    let resolver = EndpointResolver::with_lookup(test_settings(), dns);

    let sink = RecordingSink::new();
    let subscription = resolver.watch("svc.local", sink).await.unwrap();

    let rendered = format!("{subscription:?}");
    assert!(rendered.contains("svc.local"), "got {rendered}");
}

#[tokio::test(start_paused = true)]
async fn two_resolvers_share_no_state() {
    let dns_a = MockLookup::new();
    let dns_b = MockLookup::new();
    dns_a.set("svc.local", MockAnswer::Addrs(vec![ip(1)]));
    dns_b.set("svc.local", MockAnswer::Addrs(vec![ip(2)]));

    let resolver_a = EndpointResolver::with_lookup(test_settings(), dns_a);
    let resolver_b = EndpointResolver::with_lookup(test_settings(), dns_b);

    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let _sub_a = resolver_a.watch("svc.local", sink_a.clone()).await.unwrap();
    let _sub_b = resolver_b.watch("svc.local", sink_b.clone()).await.unwrap();

    assert_eq!(sink_a.addresses()[0], vec!["10.0.0.1".to_string()]);
    assert_eq!(sink_b.addresses()[0], vec!["10.0.0.2".to_string()]);
    assert_eq!(resolver_a.active_hosts().await, 1);
    assert_eq!(resolver_b.active_hosts().await, 1);
}
