//! Contract Test: Daemon Mode
//!
//! Constraints verified:
//! - The daemon runs once on start
//! - Observed address changes trigger a new pass
//! - Each refresh tick compares every record with the provider again
//! - Shutdown terminates the engine promptly and flushes state

mod common;

use cf_dynamic_core::engine::{EngineEvent, IpSources, UpdateEngine};
use cf_dynamic_core::traits::{IpChangeEvent, IpVersion, RecordType};
use cf_dynamic_core::DomainRegistration;
use common::*;
use std::net::IpAddr;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

#[tokio::test]
async fn address_change_triggers_update() {
    let first = IpAddr::from([198, 51, 100, 7]);
    let second = IpAddr::from([198, 51, 100, 8]);

    let provider =
        MockDnsProvider::new().with_record("home.example.com", RecordType::A, "198.51.100.1");
    let state = MockStateStore::new();
    let (source, change_tx) = ControlledIpSource::new(IpVersion::V4, Some(first));
    let source_handle = source.handle();

    let (engine, mut events) = UpdateEngine::new(
        IpSources {
            v4: Some(Box::new(source)),
            v6: None,
        },
        Box::new(MockDnsProvider::sharing_counters_with(&provider)),
        Box::new(MockStateStore::sharing_counters_with(&state)),
        vec![DomainRegistration::new("home.example.com").with_v6_disabled(true)],
        fast_config(),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        engine
            .run_with_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    sleep(Duration::from_millis(50)).await;
    assert_eq!(
        provider.content("home.example.com", RecordType::A).as_deref(),
        Some("198.51.100.7"),
        "initial pass runs on start"
    );

    source_handle.set_current(Some(second));
    change_tx
        .send(IpChangeEvent::new(second, Some(first)))
        .unwrap();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(
        provider.content("home.example.com", RecordType::A).as_deref(),
        Some("198.51.100.8")
    );
    assert_eq!(provider.update_call_count(), 2);

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("engine stops within 5 seconds")
        .unwrap()
        .unwrap();

    let mut started = false;
    let mut stopped = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::Started { domains_count } => {
                assert_eq!(domains_count, 1);
                started = true;
            }
            EngineEvent::Stopped { .. } => stopped = true,
            _ => {}
        }
    }
    assert!(started && stopped);
}

#[tokio::test]
async fn shutdown_flushes_state() {
    let provider =
        MockDnsProvider::new().with_record("home.example.com", RecordType::A, "198.51.100.7");
    let state = MockStateStore::new();
    let (sources, _source) = v4_sources([198, 51, 100, 7]);

    let (engine, _events) = UpdateEngine::new(
        sources,
        Box::new(MockDnsProvider::sharing_counters_with(&provider)),
        Box::new(MockStateStore::sharing_counters_with(&state)),
        vec![DomainRegistration::new("home.example.com").with_v6_disabled(true)],
        fast_config(),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        engine
            .run_with_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    let result = timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");
    assert!(result.unwrap().unwrap().is_ok());
    assert_eq!(state.flush_call_count(), 1);
}

/// Wait for the next `RecordUpdated` event
async fn next_update(events: &mut mpsc::Receiver<EngineEvent>) -> (String, IpAddr) {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event within 5 seconds")
            .expect("engine still running");
        if let EngineEvent::RecordUpdated { previous, new_ip, .. } = event {
            return (previous, new_ip);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn refresh_tick_rereads_records() {
    let ip = IpAddr::from([198, 51, 100, 7]);
    let provider =
        MockDnsProvider::new().with_record("home.example.com", RecordType::A, "198.51.100.1");
    let state = MockStateStore::new();
    let (sources, _source) = v4_sources([198, 51, 100, 7]);

    let (engine, mut events) = UpdateEngine::new(
        sources,
        Box::new(MockDnsProvider::sharing_counters_with(&provider)),
        Box::new(MockStateStore::sharing_counters_with(&state)),
        vec![DomainRegistration::new("home.example.com").with_v6_disabled(true)],
        fast_config(),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        engine
            .run_with_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    assert_eq!(next_update(&mut events).await, ("198.51.100.1".to_string(), ip));
    provider.set_content("home.example.com", RecordType::A, "198.51.100.99");

    // The stored state is fresh and matches, only the tick forces a comparison
    tokio::time::advance(Duration::from_secs(fast_config().refresh_interval_secs + 1)).await;

    assert_eq!(next_update(&mut events).await, ("198.51.100.99".to_string(), ip));
    assert_eq!(provider.get_call_count(), 2);
    assert_eq!(provider.begin_pass_count(), 2);
    assert_eq!(provider.update_call_count(), 2);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
