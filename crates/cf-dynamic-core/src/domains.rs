// # Domain Registrations
//
// The list of names cf-dynamic keeps up to date, stored as pretty-printed
// JSON:
//
// ```json
// [
//   {
//     "domain": "home.example.com",
//     "v4_disabled": false,
//     "v4_suffix": null,
//     "v6_disabled": false,
//     "v6_suffix": "0:0:0:42"
//   }
// ]
// ```
//
// A missing or empty file is an empty list.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::atomic::write_atomic;
use crate::error::{Error, Result};
use crate::suffix::validate_suffix;
use crate::traits::IpVersion;

/// A domain whose address records are managed by cf-dynamic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRegistration {
    /// Fully qualified record name
    pub domain: String,
    /// Skip the A record
    #[serde(default)]
    pub v4_disabled: bool,
    /// Trailing octets replacing those of the discovered IPv4 address
    #[serde(default)]
    pub v4_suffix: Option<String>,
    /// Skip the AAAA record
    #[serde(default)]
    pub v6_disabled: bool,
    /// Trailing groups replacing those of the discovered IPv6 address
    #[serde(default)]
    pub v6_suffix: Option<String>,
}

impl DomainRegistration {
    /// Create a registration with both families enabled and no suffixes
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            v4_disabled: false,
            v4_suffix: None,
            v6_disabled: false,
            v6_suffix: None,
        }
    }

    /// Set the IPv4 suffix
    pub fn with_v4_suffix(mut self, suffix: Option<String>) -> Self {
        self.v4_suffix = suffix;
        self
    }

    /// Set the IPv6 suffix
    pub fn with_v6_suffix(mut self, suffix: Option<String>) -> Self {
        self.v6_suffix = suffix;
        self
    }

    /// Disable or enable the A record
    pub fn with_v4_disabled(mut self, disabled: bool) -> Self {
        self.v4_disabled = disabled;
        self
    }

    /// Disable or enable the AAAA record
    pub fn with_v6_disabled(mut self, disabled: bool) -> Self {
        self.v6_disabled = disabled;
        self
    }

    /// Whether the record for `version` is managed
    pub fn is_enabled(&self, version: IpVersion) -> bool {
        match version {
            IpVersion::V4 => !self.v4_disabled,
            IpVersion::V6 => !self.v6_disabled,
        }
    }

    /// The configured suffix for `version`
    pub fn suffix(&self, version: IpVersion) -> Option<&str> {
        match version {
            IpVersion::V4 => self.v4_suffix.as_deref(),
            IpVersion::V6 => self.v6_suffix.as_deref(),
        }
    }

    /// Short description for listings: `Disabled`, the suffix, or `Default`
    pub fn describe(&self, version: IpVersion) -> &str {
        if !self.is_enabled(version) {
            return "Disabled";
        }
        self.suffix(version).unwrap_or("Default")
    }

    /// Validate the name and suffixes
    pub fn validate(&self) -> Result<()> {
        validate_domain_name(&self.domain)?;

        if self.v4_disabled && self.v6_disabled {
            return Err(Error::invalid_input(format!(
                "Domain '{}' would have both IPv4 and IPv6 disabled",
                self.domain
            )));
        }

        for version in [IpVersion::V4, IpVersion::V6] {
            if let Some(suffix) = self.suffix(version) {
                validate_suffix(version, suffix)?;
            }
        }

        Ok(())
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, allowed characters.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::invalid_input("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::invalid_input(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for (i, label) in domain.split('.').enumerate() {
        if label.is_empty() {
            return Err(Error::invalid_input(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::invalid_input(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Only the leftmost label may be a wildcard
        if label == "*" && i == 0 {
            continue;
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_input(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_input(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// Add `registration` to `domains` unless the name is already present
pub fn register(domains: &mut Vec<DomainRegistration>, registration: DomainRegistration) -> Result<()> {
    if domains.iter().any(|d| d.domain == registration.domain) {
        return Err(Error::AlreadyRegistered(registration.domain));
    }
    registration.validate()?;
    domains.push(registration);
    Ok(())
}

/// Remove the registration for `domain`, returning it
pub fn remove(domains: &mut Vec<DomainRegistration>, domain: &str) -> Result<DomainRegistration> {
    let index = domains
        .iter()
        .position(|d| d.domain == domain)
        .ok_or_else(|| Error::NotRegistered(domain.to_string()))?;
    Ok(domains.remove(index))
}

/// Find the registration for `domain`
pub fn find<'a>(domains: &'a [DomainRegistration], domain: &str) -> Result<&'a DomainRegistration> {
    domains
        .iter()
        .find(|d| d.domain == domain)
        .ok_or_else(|| Error::NotRegistered(domain.to_string()))
}

/// JSON file holding the domain registrations
#[derive(Debug, Clone)]
pub struct DomainStore {
    path: PathBuf,
}

impl DomainStore {
    /// Create a store for the file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the domains file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all registrations; a missing or empty file is an empty list
    pub async fn load(&self) -> Result<Vec<DomainRegistration>> {
        if !self.path.exists() {
            tracing::debug!("Domains file does not exist: {}", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::config(format!(
                "Unable to read {} (Error: {})",
                self.path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Unable to parse {} (Error: {})",
                self.path.display(),
                e
            ))
        })
    }

    /// Atomically replace the file with `domains`
    pub async fn save(&self, domains: &[DomainRegistration]) -> Result<()> {
        let json = serde_json::to_string_pretty(domains)?;
        write_atomic(&self.path, json.as_bytes(), None)
            .await
            .map_err(|e| {
                Error::config(format!(
                    "Unable to write {} (Error: {})",
                    self.path.display(),
                    e
                ))
            })
    }
}
