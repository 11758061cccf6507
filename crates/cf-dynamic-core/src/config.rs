//! Configuration types for cf-dynamic
//!
//! Component settings that are not stored in the `key=value` file: where
//! public addresses are discovered and how the update engine behaves.

use serde::{Deserialize, Serialize};

use crate::traits::IpVersion;

/// Default echo service for IPv4
pub const DEFAULT_IPV4_URL: &str = "https://ipv4.icanhazip.com";
/// Default echo service for IPv6
pub const DEFAULT_IPV6_URL: &str = "https://ipv6.icanhazip.com";

/// Default poll interval for `daemon` mode (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// HTTP address source configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSourceConfig {
    /// URL returning the caller's address as plain text
    pub url: String,
    /// Address family the URL is expected to return
    pub version: IpVersion,
    /// Poll interval in seconds (used by `watch`)
    pub interval_secs: u64,
}

impl IpSourceConfig {
    /// Default IPv4 source (icanhazip)
    pub fn ipv4() -> Self {
        Self {
            url: DEFAULT_IPV4_URL.to_string(),
            version: IpVersion::V4,
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    /// Default IPv6 source (icanhazip)
    pub fn ipv6() -> Self {
        Self {
            url: DEFAULT_IPV6_URL.to_string(),
            version: IpVersion::V6,
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    /// Set the poll interval
    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("IP source URL cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "IP source URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if !(10..=3600).contains(&self.interval_secs) {
            return Err(crate::Error::config(format!(
                "Poll interval must be between 10 and 3600 seconds. Got: {}",
                self.interval_secs
            )));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Re-push records after this many seconds even if the public addresses
    /// did not change (default 12 hours)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Maximum number of retry attempts for a failed record update
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay between retry attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.refresh_interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "Max retries must be between 0 and 10. Got: {}",
                self.max_retries
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

fn default_refresh_interval_secs() -> u64 {
    60 * 60 * 12
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
