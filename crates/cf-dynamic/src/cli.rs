//! Command line interface

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use cf_dynamic_core::Overrides;
use cf_dynamic_core::config::DEFAULT_POLL_INTERVAL_SECS;

/// Dynamic DNS updates for Cloudflare domains
#[derive(Debug, Parser)]
#[command(name = "cf-dynamic", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (`key=value` lines)
    #[arg(short, long, env = "CONFIG_PATH", global = true)]
    pub config_file: Option<PathBuf>,

    /// Domains file (JSON)
    #[arg(short, long, env = "DOMAINS_PATH", global = true)]
    pub domains_file: Option<PathBuf>,

    /// Cloudflare API token, overrides the configuration file
    #[arg(long, env = "CLOUDFLARE_TOKEN", hide_env_values = true, global = true)]
    pub cloudflare_token: Option<String>,

    /// Read from Cloudflare but only log record updates
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Lists all registered domains
    List {
        /// Also show the Cloudflare record ids
        #[arg(long)]
        debug: bool,
    },
    /// Shows the status of a registered domain
    Status { domain: String },
    /// Deletes a registered domain
    Delete { domain: String },
    /// Registers a new domain
    Register {
        domain: String,
        /// Suffix for IPv4
        #[arg(short = '4', long)]
        v4_suffix: Option<String>,
        /// Suffix for IPv6
        #[arg(short = '6', long)]
        v6_suffix: Option<String>,
        /// Do not manage the A record
        #[arg(long)]
        disable_v4: bool,
        /// Do not manage the AAAA record
        #[arg(long)]
        disable_v6: bool,
    },
    /// Updates all registered domains
    Update {
        /// Update even if the addresses have not changed
        #[arg(short, long)]
        force: bool,
    },
    /// Verifies and stores a Cloudflare API token
    Login {
        /// The token to store as authentication for the cloudflare api
        cloudflare_token: String,
    },
    /// Keeps the records up to date until interrupted
    Daemon {
        /// Address poll interval in seconds
        #[arg(
            long,
            default_value_t = DEFAULT_POLL_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(10..=3600)
        )]
        interval: u64,
    },
}

impl Cli {
    /// Settings overrides from flags and environment
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config_file.clone(),
            domains_file: self.domains_file.clone(),
            cloudflare_token: self.cloudflare_token.clone(),
        }
    }

    /// Whether this invocation runs until interrupted
    pub fn is_daemon(&self) -> bool {
        matches!(self.command, Commands::Daemon { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cf-dynamic").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_register_flags() {
        let cli = parse(&["register", "home.example.com", "-4", "42", "--disable-v6"]);
        match cli.command {
            Commands::Register {
                domain,
                v4_suffix,
                v6_suffix,
                disable_v4,
                disable_v6,
            } => {
                assert_eq!(domain, "home.example.com");
                assert_eq!(v4_suffix.as_deref(), Some("42"));
                assert_eq!(v6_suffix, None);
                assert!(!disable_v4);
                assert!(disable_v6);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["update", "--force", "-c", "/tmp/x.conf", "--dry-run", "-vv"]);
        assert!(matches!(cli.command, Commands::Update { force: true }));
        assert_eq!(cli.config_file, Some(PathBuf::from("/tmp/x.conf")));
        assert!(cli.dry_run);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_daemon_interval_bounds() {
        assert!(matches!(
            parse(&["daemon"]).command,
            Commands::Daemon { interval: 300 }
        ));
        assert!(
            Cli::try_parse_from(["cf-dynamic", "daemon", "--interval", "5"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["cf-dynamic", "daemon", "--interval", "3601"]).is_err()
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["cf-dynamic"]).is_err());
    }
}
