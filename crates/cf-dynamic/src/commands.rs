//! Subcommand handlers
//!
//! Each handler writes its user-facing result to `out` and returns the exit
//! code; unexpected failures are returned as errors.

use anyhow::{Context, Result};
use std::future::Future;
use std::io::Write;
use tracing::{debug, info, warn};

use cf_dynamic_cloudflare::CloudflareProvider;
use cf_dynamic_core::config::{DEFAULT_POLL_INTERVAL_SECS, EngineConfig, IpSourceConfig};
use cf_dynamic_core::domains::{self, DomainRegistration, DomainStore};
use cf_dynamic_core::engine::{IpSources, UpdateEngine};
use cf_dynamic_core::traits::{DnsProvider, IpVersion, RecordType, StateStore};
use cf_dynamic_core::{ConfStateStore, Error, MemoryStateStore, Settings};
use cf_dynamic_ip_http::HttpIpSource;

use crate::CliExitCode;
use crate::output::{domain_row, domain_table, outcome_line};
use prettytable::Cell;

fn cloudflare(settings: &Settings, dry_run: bool) -> Result<CloudflareProvider> {
    Ok(CloudflareProvider::new(settings.api_token()?, dry_run)?)
}

/// Both icanhazip sources polling every `interval_secs`
fn ip_sources(interval_secs: u64) -> Result<IpSources> {
    Ok(IpSources {
        v4: Some(Box::new(HttpIpSource::new(
            IpSourceConfig::ipv4().with_interval(interval_secs),
        )?)),
        v6: Some(Box::new(HttpIpSource::new(
            IpSourceConfig::ipv6().with_interval(interval_secs),
        )?)),
    })
}

/// Dry runs must not record the observed addresses
fn state_store(settings: &Settings, dry_run: bool) -> Box<dyn StateStore> {
    if dry_run {
        Box::new(MemoryStateStore::with_state(ConfStateStore::state_from(
            settings.conf(),
        )))
    } else {
        Box::new(ConfStateStore::new(settings.config_path()))
    }
}

/// The next `update` must compare every record after the domain list changed
async fn forget_last_update(settings: &Settings) -> Result<()> {
    ConfStateStore::new(settings.config_path())
        .clear()
        .await
        .context("Error while writing the config file")
}

async fn load_domains(settings: &Settings) -> Result<Vec<DomainRegistration>> {
    Ok(DomainStore::new(settings.domains_path()).load().await?)
}

async fn record_id(
    provider: &CloudflareProvider,
    domain: &str,
    record_type: RecordType,
) -> Result<String> {
    match provider.get_record(domain, record_type).await {
        Ok(record) => Ok(record.id),
        Err(e) if e.is_not_found() => Ok("Not Found".to_string()),
        Err(e) => Err(e.into()),
    }
}

/// `list [--debug]`
pub async fn list(
    settings: &Settings,
    show_ids: bool,
    dry_run: bool,
    out: &mut impl Write,
) -> Result<CliExitCode> {
    let registrations = load_domains(settings).await?;

    let mut table = domain_table(show_ids);

    // Token is not needed for listing domains
    let provider = if show_ids {
        Some(cloudflare(settings, dry_run)?)
    } else {
        None
    };

    for registration in &registrations {
        let mut row = domain_row(registration);

        if let Some(provider) = &provider {
            let id4 = record_id(provider, &registration.domain, RecordType::A).await?;
            let id6 = record_id(provider, &registration.domain, RecordType::Aaaa).await?;
            row.insert_cell(2, Cell::new(&id4));
            row.insert_cell(4, Cell::new(&id6));
        }

        table.add_row(row);
    }

    write!(out, "{}", table)?;
    Ok(CliExitCode::Success)
}

/// `status <domain>`
pub async fn status(
    settings: &Settings,
    domain: &str,
    dry_run: bool,
    out: &mut impl Write,
) -> Result<CliExitCode> {
    let registrations = load_domains(settings).await?;
    let registration = match domains::find(&registrations, domain) {
        Ok(registration) => registration,
        Err(Error::NotRegistered(_)) => {
            writeln!(out, "Domain '{}' is not registered", domain)?;
            return Ok(CliExitCode::ConfigError);
        }
        Err(e) => return Err(e.into()),
    };

    let provider = cloudflare(settings, dry_run)?;

    writeln!(out, "Domain: {}", registration.domain)?;
    for version in [IpVersion::V4, IpVersion::V6] {
        writeln!(out, "{}: {}", version, registration.describe(version))?;
        if !registration.is_enabled(version) {
            continue;
        }

        let record_type = RecordType::from(version);
        match provider.get_record(&registration.domain, record_type).await {
            Ok(record) => writeln!(
                out,
                "  {} record {}: {}",
                record_type, record.id, record.content
            )?,
            Err(e) if e.is_not_found() => writeln!(out, "  {} record: Not Found", record_type)?,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(CliExitCode::Success)
}

/// `delete <domain>`
pub async fn delete(settings: &Settings, domain: &str, out: &mut impl Write) -> Result<CliExitCode> {
    let store = DomainStore::new(settings.domains_path());
    let mut registrations = store.load().await?;

    match domains::remove(&mut registrations, domain) {
        Ok(_) => {
            store
                .save(&registrations)
                .await
                .context("Error while writing the domains file")?;
            forget_last_update(settings).await?;
            writeln!(out, "Deleted domain '{}' successfully", domain)?;
            Ok(CliExitCode::Success)
        }
        Err(Error::NotRegistered(_)) => {
            writeln!(out, "Domain '{}' is not registered", domain)?;
            Ok(CliExitCode::ConfigError)
        }
        Err(e) => Err(e.into()),
    }
}

/// `register <domain> ...`
pub async fn register(
    settings: &Settings,
    registration: DomainRegistration,
    out: &mut impl Write,
) -> Result<CliExitCode> {
    let store = DomainStore::new(settings.domains_path());
    let mut registrations = store.load().await?;
    let domain = registration.domain.clone();

    match domains::register(&mut registrations, registration) {
        Ok(()) => {
            store
                .save(&registrations)
                .await
                .context("Error while writing the domains file")?;
            forget_last_update(settings).await?;
            writeln!(out, "Registered domain '{}' successfully", domain)?;
            Ok(CliExitCode::Success)
        }
        Err(Error::AlreadyRegistered(_)) => {
            writeln!(out, "Domain '{}' is already registered", domain)?;
            Ok(CliExitCode::ConfigError)
        }
        Err(e) => Err(e.into()),
    }
}

/// `update [--force]`
pub async fn update(
    settings: &Settings,
    force: bool,
    dry_run: bool,
    out: &mut impl Write,
) -> Result<CliExitCode> {
    let registrations = load_domains(settings).await?;
    if registrations.is_empty() {
        writeln!(out, "No domains registered")?;
        return Ok(CliExitCode::Success);
    }

    let (engine, _events) = UpdateEngine::new(
        ip_sources(DEFAULT_POLL_INTERVAL_SECS)?,
        Box::new(cloudflare(settings, dry_run)?),
        state_store(settings, dry_run),
        registrations,
        EngineConfig::default(),
    )?;

    let report = engine.run_once(force).await?;

    if report.skipped {
        writeln!(out, "IP addresses have not changed, skipping update")?;
        return Ok(CliExitCode::Success);
    }
    if report.refreshed {
        writeln!(
            out,
            "IP addresses have not changed, but it has been more than 12 hours since the last update, updating anyway"
        )?;
    }

    for record in &report.records {
        if let Some(line) = outcome_line(record) {
            writeln!(out, "{}", line)?;
        }
    }

    Ok(if report.has_failures() {
        CliExitCode::RuntimeError
    } else if report.has_missing() {
        CliExitCode::ConfigError
    } else {
        CliExitCode::Success
    })
}

/// `login <token>`
pub async fn login(settings: &mut Settings, token: &str, out: &mut impl Write) -> Result<CliExitCode> {
    let provider = CloudflareProvider::new(token, false)?;
    login_with(settings, &provider, token, out).await
}

/// Verify `token` through `provider` and store it on success
async fn login_with(
    settings: &mut Settings,
    provider: &dyn DnsProvider,
    token: &str,
    out: &mut impl Write,
) -> Result<CliExitCode> {
    match provider.verify().await {
        Ok(()) => {
            settings
                .store_token(token)
                .await
                .context("Error while writing the config file")?;
            info!("Token stored in {}", settings.config_path().display());
            writeln!(out, "Successfully logged in")?;
            Ok(CliExitCode::Success)
        }
        Err(e) => {
            warn!("Token verification failed: {}", e);
            writeln!(out, "Failed to login")?;
            Ok(match e {
                Error::Authentication(_) => CliExitCode::ConfigError,
                _ => CliExitCode::RuntimeError,
            })
        }
    }
}

/// `daemon [--interval SECS]`
pub async fn daemon(settings: &Settings, interval_secs: u64, dry_run: bool) -> Result<CliExitCode> {
    let registrations = load_domains(settings).await?;
    if registrations.is_empty() {
        warn!("No domains registered; the daemon will only watch addresses");
    }
    info!(
        "Starting cf-dynamic daemon: {} domain(s), poll interval {}s",
        registrations.len(),
        interval_secs
    );

    let (engine, mut events) = UpdateEngine::new(
        ip_sources(interval_secs)?,
        Box::new(cloudflare(settings, dry_run)?),
        state_store(settings, dry_run),
        registrations,
        EngineConfig::default(),
    )?;

    let monitor = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Engine event");
        }
    });

    let shutdown = shutdown_signal()?;
    engine.run_with_shutdown(shutdown).await?;

    // Dropping the engine closes the event channel
    drop(engine);
    let _ = monitor.await;

    info!("Shutting down daemon");
    Ok(CliExitCode::Success)
}

/// Resolve on SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Resolve on CTRL-C
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to wait for CTRL-C: {}", e);
        }
        info!("Received shutdown signal: SIGINT");
    })
}
