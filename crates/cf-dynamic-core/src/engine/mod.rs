//! Update engine
//!
//! The UpdateEngine is responsible for:
//! - Discovering the public addresses via IpSource
//! - Deciding whether a run is needed (StateStore + refresh interval)
//! - Deriving each registration's desired address (suffixes)
//! - Overwriting records whose content differs via DnsProvider (with retries)
//! - Persisting the observed addresses after a clean run
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ IpSource v4 │──┐
//! ├─────────────┤  │ addresses
//! │ IpSource v6 │──┤
//! └─────────────┘  ▼
//!           ┌──────────────┐
//!           │ UpdateEngine │── EngineEvent ──▶ (monitoring)
//!           └──────────────┘
//!              │        │
//!              ▼        ▼
//!     ┌─────────────┐ ┌─────────────┐
//!     │ StateStore  │ │ DnsProvider │
//!     │ (skip/save) │ │ (get/put)   │
//!     └─────────────┘ └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Query the sources of every family some registration needs
//! 2. Unforced runs whose addresses equal the stored ones return early,
//!    unless the last update is older than the refresh interval
//! 3. Per registration and enabled family: fetch the record, compare,
//!    overwrite if different (or forced)
//! 4. Without failed or missing records, save the observed addresses

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::{Stream, StreamExt, StreamMap};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domains::DomainRegistration;
use crate::error::{Error, Result};
use crate::suffix::apply_suffix;
use crate::traits::{
    DnsProvider, IpChangeEvent, IpSource, IpVersion, RecordType, StateStore, UpdateResult,
    UpdateState,
};

/// Events emitted by the UpdateEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started (daemon mode)
    Started { domains_count: usize },

    /// Public address discovered
    AddressObserved { version: IpVersion, ip: IpAddr },

    /// Public address could not be determined
    AddressUnavailable { version: IpVersion, error: String },

    /// Run returned early because nothing changed
    RunSkipped { reason: String },

    /// Record overwritten
    RecordUpdated {
        record_name: String,
        record_type: RecordType,
        previous: String,
        new_ip: IpAddr,
    },

    /// Record already correct
    RecordUnchanged {
        record_name: String,
        record_type: RecordType,
        current_ip: IpAddr,
    },

    /// Record does not exist at the provider
    RecordMissing {
        record_name: String,
        record_type: RecordType,
        desired_ip: IpAddr,
    },

    /// Record could not be updated
    UpdateFailed {
        record_name: String,
        record_type: RecordType,
        error: String,
        retry_count: usize,
    },

    /// Engine stopped (daemon mode)
    Stopped { reason: String },
}

/// Outcome for a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Content overwritten
    Updated { previous: String, new_ip: IpAddr },
    /// Dry-run: overwrite logged only
    WouldUpdate { previous: String, new_ip: IpAddr },
    /// Content already correct
    Unchanged { current_ip: IpAddr },
    /// No such record at the provider
    Missing { desired_ip: IpAddr },
    /// Lookup or overwrite failed after retries
    Failed { desired_ip: Option<IpAddr>, error: String },
}

/// Per-record line of an [`UpdateReport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub record_name: String,
    pub record_type: RecordType,
    pub outcome: RecordOutcome,
}

/// Summary of one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Observed IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// Observed IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// Run returned early: addresses unchanged and refresh interval not elapsed
    pub skipped: bool,
    /// Addresses were unchanged but the refresh interval had elapsed
    pub refreshed: bool,
    /// One entry per checked record, in registration order (A before AAAA)
    pub records: Vec<RecordReport>,
}

impl UpdateReport {
    /// Whether any record failed
    pub fn has_failures(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r.outcome, RecordOutcome::Failed { .. }))
    }

    /// Whether any record is missing at the provider
    pub fn has_missing(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r.outcome, RecordOutcome::Missing { .. }))
    }
}

/// Address sources per family; a family without a source is never updated
#[derive(Default)]
pub struct IpSources {
    pub v4: Option<Box<dyn IpSource>>,
    pub v6: Option<Box<dyn IpSource>>,
}

impl IpSources {
    fn get(&self, version: IpVersion) -> Option<&dyn IpSource> {
        match version {
            IpVersion::V4 => self.v4.as_deref(),
            IpVersion::V6 => self.v6.as_deref(),
        }
    }
}

/// A provider operation that failed after `retries` retries
#[derive(Debug)]
struct RetryFailure {
    error: Error,
    retries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Return early when nothing changed
    Normal,
    /// Compare every record even if nothing changed locally
    Refresh,
    /// Overwrite every record
    Force,
}

/// Core update engine
///
/// ## Lifecycle
///
/// - One-shot: [`UpdateEngine::run_once()`] (the `update` command)
/// - Daemon: [`UpdateEngine::run_with_shutdown()`] runs once, then on every observed
///   address change and every refresh interval until shutdown
///
/// Retry policy lives here; providers perform single attempts.
pub struct UpdateEngine {
    sources: IpSources,
    provider: Box<dyn DnsProvider>,
    state_store: Box<dyn StateStore>,
    domains: Vec<DomainRegistration>,
    config: EngineConfig,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl UpdateEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events.
    /// Dropping the receiver is fine; events are then discarded.
    pub fn new(
        sources: IpSources,
        provider: Box<dyn DnsProvider>,
        state_store: Box<dyn StateStore>,
        domains: Vec<DomainRegistration>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        for version in [IpVersion::V4, IpVersion::V6] {
            if let Some(source) = sources.get(version) {
                if source.version().is_some_and(|v| v != version) {
                    return Err(Error::config(format!(
                        "{} source configured in the {} slot",
                        source.version().map(|v| v.to_string()).unwrap_or_default(),
                        version
                    )));
                }
            }
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            sources,
            provider,
            state_store,
            domains,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run one update pass
    ///
    /// With `force`, every enabled record is overwritten even if the stored
    /// addresses and the record content already match.
    pub async fn run_once(&self, force: bool) -> Result<UpdateReport> {
        let mode = if force { RunMode::Force } else { RunMode::Normal };
        self.run_pass(mode).await
    }

    /// Run one pass that compares every record with the provider
    pub async fn refresh(&self) -> Result<UpdateReport> {
        self.run_pass(RunMode::Refresh).await
    }

    /// Run as a daemon until `shutdown` resolves
    pub async fn run_with_shutdown<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.emit_event(EngineEvent::Started {
            domains_count: self.domains.len(),
        });

        self.log_pass(self.run_pass(RunMode::Normal).await);

        let mut changes: StreamMap<IpVersion, Pin<Box<dyn Stream<Item = IpChangeEvent> + Send>>> =
            StreamMap::new();
        for version in self.needed_versions() {
            if let Some(source) = self.sources.get(version) {
                changes.insert(version, source.watch());
            }
        }

        let period = Duration::from_secs(self.config.refresh_interval_secs);
        let mut refresh = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some((version, event)) = changes.next() => {
                    info!(
                        "{} address change observed: {:?} -> {}",
                        version, event.previous_ip, event.new_ip
                    );
                    self.log_pass(self.run_pass(RunMode::Normal).await);
                }

                _ = refresh.tick() => {
                    info!("Refresh interval elapsed, comparing records");
                    self.log_pass(self.refresh().await);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.state_store.flush().await?;
        info!("State flushed, engine stopped");

        Ok(())
    }

    fn log_pass(&self, result: Result<UpdateReport>) {
        match result {
            Ok(report) if report.skipped => debug!("Addresses unchanged, nothing to do"),
            Ok(report) => {
                if report.has_failures() {
                    warn!("Update pass finished with failures");
                } else {
                    debug!("Update pass finished ({} records)", report.records.len());
                }
            }
            Err(e) => error!("Update pass failed: {}", e),
        }
    }

    /// Families enabled by at least one registration
    fn needed_versions(&self) -> Vec<IpVersion> {
        [IpVersion::V4, IpVersion::V6]
            .into_iter()
            .filter(|v| self.domains.iter().any(|d| d.is_enabled(*v)))
            .collect()
    }

    async fn observe(&self, version: IpVersion) -> Option<IpAddr> {
        let source = match self.sources.get(version) {
            Some(source) => source,
            None => {
                debug!("No {} source configured", version);
                return None;
            }
        };

        match source.current().await {
            Ok(ip) if version.matches(&ip) => {
                debug!("Current {} address: {}", version, ip);
                self.emit_event(EngineEvent::AddressObserved { version, ip });
                Some(ip)
            }
            Ok(ip) => {
                warn!("{} source returned {} which is not an {} address", version, ip, version);
                self.emit_event(EngineEvent::AddressUnavailable {
                    version,
                    error: format!("unexpected address {}", ip),
                });
                None
            }
            Err(e) => {
                warn!("Unable to determine {} address: {}", version, e);
                self.emit_event(EngineEvent::AddressUnavailable {
                    version,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn run_pass(&self, mode: RunMode) -> Result<UpdateReport> {
        let mut report = UpdateReport::default();

        let needed = self.needed_versions();
        if needed.is_empty() {
            info!("No domains registered, nothing to update");
            return Ok(report);
        }

        for version in &needed {
            match self.observe(*version).await {
                Some(IpAddr::V4(ip)) => report.ipv4 = Some(ip),
                Some(IpAddr::V6(ip)) => report.ipv6 = Some(ip),
                None => {}
            }
        }

        if report.ipv4.is_none() && report.ipv6.is_none() {
            return Err(Error::ip_source("No public address could be determined"));
        }

        let now = chrono::Utc::now();
        let state = self.state_store.load().await?;

        if mode == RunMode::Normal && state.matches(report.ipv4, report.ipv6) {
            let window = chrono::Duration::seconds(self.config.refresh_interval_secs as i64);
            if state.is_fresh(window, now) {
                info!("IP addresses have not changed, skipping update");
                self.emit_event(EngineEvent::RunSkipped {
                    reason: "IP addresses unchanged".to_string(),
                });
                report.skipped = true;
                return Ok(report);
            }
            info!("IP addresses have not changed, but the refresh interval elapsed, updating anyway");
            report.refreshed = true;
        }

        self.provider.begin_pass().await;

        for domain in &self.domains {
            for version in [IpVersion::V4, IpVersion::V6] {
                if !domain.is_enabled(version) {
                    continue;
                }

                let observed = match version {
                    IpVersion::V4 => report.ipv4.map(IpAddr::V4),
                    IpVersion::V6 => report.ipv6.map(IpAddr::V6),
                };
                let Some(observed) = observed else {
                    debug!("Skipping {} record of {}: no {} address", RecordType::from(version), domain.domain, version);
                    continue;
                };

                let record_type = RecordType::from(version);
                let outcome = match apply_suffix(observed, domain.suffix(version)) {
                    Ok(desired) => {
                        self.sync_record(&domain.domain, record_type, desired, mode == RunMode::Force)
                            .await
                    }
                    Err(e) => {
                        error!("Invalid suffix for {}: {}", domain.domain, e);
                        RecordOutcome::Failed {
                            desired_ip: None,
                            error: e.to_string(),
                        }
                    }
                };

                report.records.push(RecordReport {
                    record_name: domain.domain.clone(),
                    record_type,
                    outcome,
                });
            }
        }

        if report.has_failures() || report.has_missing() {
            warn!("Not recording update state: some records were not updated");
        } else {
            self.state_store
                .save(&UpdateState::observed(report.ipv4, report.ipv6, now))
                .await?;
        }

        Ok(report)
    }

    /// Bring a single record in line with `desired`
    async fn sync_record(
        &self,
        record_name: &str,
        record_type: RecordType,
        desired: IpAddr,
        force: bool,
    ) -> RecordOutcome {
        let record = match self
            .with_retry(record_name, record_type, || {
                self.provider.get_record(record_name, record_type)
            })
            .await
        {
            Ok(record) => record,
            Err(failure) if failure.error.is_not_found() => {
                warn!("{}: No {} record found", record_name, record_type);
                self.emit_event(EngineEvent::RecordMissing {
                    record_name: record_name.to_string(),
                    record_type,
                    desired_ip: desired,
                });
                return RecordOutcome::Missing { desired_ip: desired };
            }
            Err(failure) => return self.failed(record_name, record_type, Some(desired), failure),
        };

        if record.points_at(desired) && !force {
            debug!("{} {} already points at {}", record_name, record_type, desired);
            self.emit_event(EngineEvent::RecordUnchanged {
                record_name: record_name.to_string(),
                record_type,
                current_ip: desired,
            });
            return RecordOutcome::Unchanged { current_ip: desired };
        }

        match self
            .with_retry(record_name, record_type, || {
                self.provider.update_record(record_name, record_type, desired)
            })
            .await
        {
            Ok(UpdateResult::Updated { previous, new_ip }) => {
                info!("Updated {} {}: {} -> {}", record_name, record_type, previous, new_ip);
                self.emit_event(EngineEvent::RecordUpdated {
                    record_name: record_name.to_string(),
                    record_type,
                    previous: previous.clone(),
                    new_ip,
                });
                RecordOutcome::Updated { previous, new_ip }
            }
            Ok(UpdateResult::DryRun { previous, new_ip }) => {
                info!("[DRY-RUN] Would update {} {}: {} -> {}", record_name, record_type, previous, new_ip);
                RecordOutcome::WouldUpdate { previous, new_ip }
            }
            Err(failure) => self.failed(record_name, record_type, Some(desired), failure),
        }
    }

    fn failed(
        &self,
        record_name: &str,
        record_type: RecordType,
        desired_ip: Option<IpAddr>,
        failure: RetryFailure,
    ) -> RecordOutcome {
        let RetryFailure { error, retries } = failure;
        error!("Failed to update {} {}: {}", record_name, record_type, error);
        self.emit_event(EngineEvent::UpdateFailed {
            record_name: record_name.to_string(),
            record_type,
            error: error.to_string(),
            retry_count: retries,
        });
        RecordOutcome::Failed {
            desired_ip,
            error: error.to_string(),
        }
    }

    /// Run a provider operation with the configured retry policy
    ///
    /// Permanent errors (`NotFound`, authentication, invalid input) are
    /// returned immediately.
    async fn with_retry<T, F, Fut>(
        &self,
        record_name: &str,
        record_type: RecordType,
        mut op: F,
    ) -> std::result::Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_permanent() => {
                    return Err(RetryFailure {
                        error,
                        retries: attempt,
                    });
                }
                Err(e) if attempt < self.config.max_retries => {
                    warn!(
                        "Attempt {} failed for {} {}: {}",
                        attempt, record_name, record_type, e
                    );
                    attempt += 1;
                    tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                }
                Err(e) => {
                    warn!(
                        "{} gave up on {} {} after {} retries",
                        self.provider.provider_name(),
                        record_name,
                        record_type,
                        attempt
                    );
                    return Err(RetryFailure {
                        error: e,
                        retries: attempt,
                    });
                }
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening (one-shot CLI runs)
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
