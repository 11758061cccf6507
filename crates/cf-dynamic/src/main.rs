// # cf-dynamic
//
// Command line front end for cf-dynamic-core. Parses arguments, resolves
// settings, installs logging and dispatches to one subcommand.
//
// ## Logging
//
// Logs go to stderr; command results go to stdout. The level is chosen by
// `-v` (info), `-vv` (debug), `-vvv` (trace), or else by
// `CF_DYNAMIC_LOG_LEVEL`. Without either, one-shot commands log warnings
// only and the daemon logs at info.
//
// ## Exit codes
//
// - 0: Success
// - 1: Configuration error, usage error or missing DNS record
// - 2: Runtime error (network, provider, unexpected failure)

mod cli;
mod commands;
mod output;

include!(concat!(env!("OUT_DIR"), "/constants.rs"));

use anyhow::Result;
use clap::Parser;
use std::env;
use std::io::Write;
use std::process::ExitCode;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

use cf_dynamic_core::{DomainRegistration, Error, Settings};

use crate::cli::{Cli, Commands};

/// Exit codes for the different outcomes of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliExitCode {
    /// Command completed
    Success = 0,
    /// Configuration error, usage error or missing record
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CliExitCode> for ExitCode {
    fn from(code: CliExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Environment variable consulted when no `-v` flag is given
const LOG_LEVEL_ENV: &str = "CF_DYNAMIC_LOG_LEVEL";

fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn log_level(verbose: u8, env_level: Option<&str>, daemon: bool) -> Result<Level, String> {
    match verbose {
        0 => match env_level {
            Some(value) => parse_level(value).ok_or_else(|| {
                format!(
                    "{} '{}' is not valid. Use one of: trace, debug, info, warn, error",
                    LOG_LEVEL_ENV, value
                )
            }),
            None if daemon => Ok(Level::INFO),
            None => Ok(Level::WARN),
        },
        1 => Ok(Level::INFO),
        2 => Ok(Level::DEBUG),
        _ => Ok(Level::TRACE),
    }
}

/// Exit code for an error that escaped a command
fn classify(err: &anyhow::Error) -> CliExitCode {
    match err.downcast_ref::<Error>() {
        Some(
            Error::Config(_)
            | Error::InvalidInput(_)
            | Error::AlreadyRegistered(_)
            | Error::NotRegistered(_)
            | Error::Authentication(_),
        ) => CliExitCode::ConfigError,
        _ => CliExitCode::RuntimeError,
    }
}

async fn execute(cli: Cli) -> Result<CliExitCode> {
    let mut settings = Settings::load(cli.overrides(), DEFAULT_CONF_FILE).await?;
    debug!("{:?}", settings);

    let dry_run = cli.dry_run;
    let mut stdout = std::io::stdout();

    let code = match cli.command {
        Commands::List { debug } => commands::list(&settings, debug, dry_run, &mut stdout).await?,
        Commands::Status { domain } => {
            commands::status(&settings, &domain, dry_run, &mut stdout).await?
        }
        Commands::Delete { domain } => commands::delete(&settings, &domain, &mut stdout).await?,
        Commands::Register {
            domain,
            v4_suffix,
            v6_suffix,
            disable_v4,
            disable_v6,
        } => {
            let registration = DomainRegistration::new(domain)
                .with_v4_suffix(v4_suffix)
                .with_v6_suffix(v6_suffix)
                .with_v4_disabled(disable_v4)
                .with_v6_disabled(disable_v6);
            commands::register(&settings, registration, &mut stdout).await?
        }
        Commands::Update { force } => {
            commands::update(&settings, force, dry_run, &mut stdout).await?
        }
        Commands::Login { cloudflare_token } => {
            commands::login(&mut settings, &cloudflare_token, &mut stdout).await?
        }
        Commands::Daemon { interval } => commands::daemon(&settings, interval, dry_run).await?,
    };

    stdout.flush()?;
    Ok(code)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                CliExitCode::ConfigError
            } else {
                CliExitCode::Success
            };
            let _ = e.print();
            return code.into();
        }
    };

    let env_level = env::var(LOG_LEVEL_ENV).ok();
    let level = match log_level(cli.verbose, env_level.as_deref(), cli.is_daemon()) {
        Ok(level) => level,
        Err(msg) => {
            eprintln!("Configuration error: {}", msg);
            return CliExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CliExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CliExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match execute(cli).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                classify(&e)
            }
        }
    });

    code.into()
}
