//! Effective settings
//!
//! Command line flags and environment variables take precedence over the
//! configuration file, which takes precedence over built-in defaults:
//!
//! | setting      | flag / env                              | config key         | default             |
//! |--------------|-----------------------------------------|--------------------|---------------------|
//! | config file  | `--config-file` / `CONFIG_PATH`         | -                  | `DEFAULT_CONF_FILE` |
//! | domains file | `--domains-file` / `DOMAINS_PATH`       | `domains_file`     | `domains.json`      |
//! | API token    | `--cloudflare-token` / `CLOUDFLARE_TOKEN` | `cloudflare_token` | (required)          |

use std::fmt;
use std::path::{Path, PathBuf};

use crate::conf::{ConfFile, KEY_CLOUDFLARE_TOKEN, KEY_DOMAINS_FILE};
use crate::error::{Error, Result};

/// Domains file used when neither a flag nor the config names one
pub const DEFAULT_DOMAINS_FILE: &str = "domains.json";

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub domains_file: Option<PathBuf>,
    pub cloudflare_token: Option<String>,
}

/// Resolved settings plus the parsed configuration file
#[derive(Clone)]
pub struct Settings {
    config_path: PathBuf,
    domains_path: PathBuf,
    token: Option<String>,
    conf: ConfFile,
}

// The token is a credential
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("config_path", &self.config_path)
            .field("domains_path", &self.domains_path)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl Settings {
    /// Resolve settings, loading the configuration file
    ///
    /// `default_conf_file` is the path baked in at build time.
    pub async fn load(overrides: Overrides, default_conf_file: &str) -> Result<Self> {
        let config_path = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_conf_file));
        let conf = ConfFile::load(&config_path).await?;
        Ok(Self::resolve(overrides, config_path, conf))
    }

    /// Resolve settings from an already parsed configuration file
    pub fn resolve(overrides: Overrides, config_path: PathBuf, conf: ConfFile) -> Self {
        let domains_path = overrides
            .domains_file
            .or_else(|| {
                conf.get(KEY_DOMAINS_FILE)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOMAINS_FILE));

        let token = overrides
            .cloudflare_token
            .filter(|t| !t.is_empty())
            .or_else(|| {
                conf.get(KEY_CLOUDFLARE_TOKEN)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
            });

        tracing::debug!(
            config = %config_path.display(),
            domains = %domains_path.display(),
            token_present = token.is_some(),
            "Resolved settings"
        );

        Self {
            config_path,
            domains_path,
            token,
            conf,
        }
    }

    /// Path of the configuration file
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Path of the domains file
    pub fn domains_path(&self) -> &Path {
        &self.domains_path
    }

    /// The parsed configuration file
    pub fn conf(&self) -> &ConfFile {
        &self.conf
    }

    /// The API token, required by every command that talks to Cloudflare
    pub fn api_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            Error::config(format!(
                "No Cloudflare token found. Run `cf-dynamic login <token>`, set CLOUDFLARE_TOKEN, \
                 or add {}=... to {}",
                KEY_CLOUDFLARE_TOKEN,
                self.config_path.display()
            ))
        })
    }

    /// Store `token` in the configuration file and in these settings
    pub async fn store_token(&mut self, token: &str) -> Result<()> {
        let mut conf = ConfFile::load(&self.config_path).await?;
        conf.set(KEY_CLOUDFLARE_TOKEN, token);
        conf.save(&self.config_path).await?;

        self.conf = conf;
        self.token = Some(token.to_string());
        Ok(())
    }
}
