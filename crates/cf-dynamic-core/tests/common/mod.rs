//! Test doubles and common utilities for engine contract tests
//!
//! These doubles keep their state behind `Arc`s so a test can hand one copy
//! to the engine and inspect another.

#![allow(dead_code)]

use cf_dynamic_core::config::EngineConfig;
use cf_dynamic_core::engine::IpSources;
use cf_dynamic_core::error::{Error, Result};
use cf_dynamic_core::traits::{
    DnsProvider, IpChangeEvent, IpSource, IpVersion, RecordMetadata, RecordType, StateStore,
    UpdateResult, UpdateState,
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// An IpSource whose address the test controls and which emits change events on demand
pub struct ControlledIpSource {
    version: IpVersion,
    /// Address returned by current(); `None` makes current() fail
    current_ip: Arc<Mutex<Option<IpAddr>>>,
    /// Receiver for the engine's watch stream
    engine_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<IpChangeEvent>>>>,
    current_call_count: Arc<AtomicUsize>,
}

impl ControlledIpSource {
    /// Create a source returning `current_ip`
    pub fn new(
        version: IpVersion,
        current_ip: Option<IpAddr>,
    ) -> (Self, mpsc::UnboundedSender<IpChangeEvent>) {
        let (test_tx, engine_rx) = mpsc::unbounded_channel();

        let source = Self {
            version,
            current_ip: Arc::new(Mutex::new(current_ip)),
            engine_rx: Arc::new(Mutex::new(Some(engine_rx))),
            current_call_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, test_tx)
    }

    /// A second handle on the same address and counters
    pub fn handle(&self) -> Self {
        Self {
            version: self.version,
            current_ip: Arc::clone(&self.current_ip),
            engine_rx: Arc::clone(&self.engine_rx),
            current_call_count: Arc::clone(&self.current_call_count),
        }
    }

    /// Change the address returned by current()
    pub fn set_current(&self, ip: Option<IpAddr>) {
        *self.current_ip.lock().unwrap() = ip;
    }

    /// Number of current() calls
    pub fn current_call_count(&self) -> usize {
        self.current_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ControlledIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.current_call_count.fetch_add(1, Ordering::SeqCst);
        let ip = *self.current_ip.lock().unwrap();
        ip.ok_or_else(|| Error::ip_source(format!("{} unavailable", self.version)))
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = IpChangeEvent> + Send + 'static>> {
        match self.engine_rx.lock().unwrap().take() {
            Some(rx) => Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)),
            None => Box::pin(tokio_stream::empty()),
        }
    }

    fn version(&self) -> Option<IpVersion> {
        Some(self.version)
    }
}

/// A DnsProvider backed by an in-memory record table
pub struct MockDnsProvider {
    records: Arc<Mutex<HashMap<(String, RecordType), String>>>,
    /// Remaining calls that fail with a transient error
    failures_remaining: Arc<AtomicUsize>,
    /// Every call fails with an authentication error
    reject_token: Arc<AtomicBool>,
    get_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    begin_pass_count: Arc<AtomicUsize>,
    updated_records: Arc<Mutex<Vec<(String, RecordType, IpAddr)>>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
            reject_token: Arc::new(AtomicBool::new(false)),
            get_call_count: Arc::new(AtomicUsize::new(0)),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            begin_pass_count: Arc::new(AtomicUsize::new(0)),
            updated_records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an existing record
    pub fn with_record(self, name: &str, record_type: RecordType, content: &str) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert((name.to_string(), record_type), content.to_string());
        self
    }

    /// Make the next `count` provider calls fail
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Make every call fail as if the API token were revoked
    pub fn reject_token(&self) {
        self.reject_token.store(true, Ordering::SeqCst);
    }

    /// Change a record behind the engine's back
    pub fn set_content(&self, name: &str, record_type: RecordType, content: &str) {
        self.records
            .lock()
            .unwrap()
            .insert((name.to_string(), record_type), content.to_string());
    }

    /// Create a provider that shares records and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            records: Arc::clone(&other.records),
            failures_remaining: Arc::clone(&other.failures_remaining),
            reject_token: Arc::clone(&other.reject_token),
            get_call_count: Arc::clone(&other.get_call_count),
            update_call_count: Arc::clone(&other.update_call_count),
            begin_pass_count: Arc::clone(&other.begin_pass_count),
            updated_records: Arc::clone(&other.updated_records),
        }
    }

    pub fn content(&self, name: &str, record_type: RecordType) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&(name.to_string(), record_type))
            .cloned()
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    pub fn begin_pass_count(&self) -> usize {
        self.begin_pass_count.load(Ordering::SeqCst)
    }

    pub fn updated_records(&self) -> Vec<(String, RecordType, IpAddr)> {
        self.updated_records.lock().unwrap().clone()
    }

    fn take_failure(&self) -> Result<()> {
        if self.reject_token.load(Ordering::SeqCst) {
            return Err(Error::auth("Invalid API token"));
        }
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::http("connection reset"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    async fn get_record(&self, record_name: &str, record_type: RecordType) -> Result<RecordMetadata> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let content = self
            .content(record_name, record_type)
            .ok_or_else(|| Error::not_found(format!("{} {}", record_type, record_name)))?;

        Ok(RecordMetadata {
            id: format!("id-{}", record_name),
            zone_id: "zone".to_string(),
            name: record_name.to_string(),
            record_type,
            content,
            ttl: Some(1),
            proxied: Some(false),
        })
    }

    async fn update_record(
        &self,
        record_name: &str,
        record_type: RecordType,
        new_ip: IpAddr,
    ) -> Result<UpdateResult> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let mut records = self.records.lock().unwrap();
        let entry = records
            .get_mut(&(record_name.to_string(), record_type))
            .ok_or_else(|| Error::not_found(format!("{} {}", record_type, record_name)))?;
        let previous = std::mem::replace(entry, new_ip.to_string());
        self.updated_records
            .lock()
            .unwrap()
            .push((record_name.to_string(), record_type, new_ip));

        Ok(UpdateResult::Updated { previous, new_ip })
    }

    async fn begin_pass(&self) {
        self.begin_pass_count.fetch_add(1, Ordering::SeqCst);
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A StateStore that tracks calls
pub struct MockStateStore {
    state: Arc<Mutex<UpdateState>>,
    save_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
    clear_call_count: Arc<AtomicUsize>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::with_state(UpdateState::default())
    }

    pub fn with_state(state: UpdateState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            save_call_count: Arc::new(AtomicUsize::new(0)),
            flush_call_count: Arc::new(AtomicUsize::new(0)),
            clear_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a store that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
            save_call_count: Arc::clone(&other.save_call_count),
            flush_call_count: Arc::clone(&other.flush_call_count),
            clear_call_count: Arc::clone(&other.clear_call_count),
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state.lock().unwrap().clone()
    }

    pub fn save_call_count(&self) -> usize {
        self.save_call_count.load(Ordering::SeqCst)
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }

    pub fn clear_call_count(&self) -> usize {
        self.clear_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StateStore for MockStateStore {
    async fn load(&self) -> Result<UpdateState> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, state: &UpdateState) -> Result<()> {
        self.save_call_count.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clear_call_count.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = UpdateState::default();
        Ok(())
    }
}

/// Engine configuration without retry delays
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        refresh_interval_secs: 43_200,
        max_retries: 2,
        retry_delay_secs: 0,
        event_channel_capacity: 100,
    }
}

/// IPv4-only sources returning `ip`
pub fn v4_sources(ip: [u8; 4]) -> (IpSources, ControlledIpSource) {
    let (source, _tx) = ControlledIpSource::new(IpVersion::V4, Some(IpAddr::from(ip)));
    let handle = source.handle();
    let sources = IpSources {
        v4: Some(Box::new(source)),
        v6: None,
    };
    (sources, handle)
}
