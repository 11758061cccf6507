// # DNS Provider Trait
//
// Defines the interface for reading and overwriting address records via a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `cf-dynamic-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cf_dynamic_core::{DnsProvider, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let record = provider.get_record("home.example.com", RecordType::A).await?;
//     provider.update_record(
//         "home.example.com",
//         RecordType::A,
//         std::net::IpAddr::from([198, 51, 100, 7]),
//     ).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

use crate::traits::IpVersion;

/// Address record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// Wire name used by DNS providers
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Parse a wire name; anything but A/AAAA yields `None`
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "A" => Some(RecordType::A),
            "AAAA" => Some(RecordType::Aaaa),
            _ => None,
        }
    }

    /// The IP version stored in records of this type
    pub fn version(&self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }
}

impl From<IpVersion> for RecordType {
    fn from(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::Aaaa,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a DNS update operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Record content was overwritten
    Updated {
        /// The previous record content
        previous: String,
        /// The new IP address
        new_ip: IpAddr,
    },
    /// Dry-run: the overwrite was logged but not sent
    DryRun {
        /// The current record content
        previous: String,
        /// The IP address that would have been written
        new_ip: IpAddr,
    },
}

/// Metadata about a DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// The record ID (provider-specific)
    pub id: String,
    /// The zone the record belongs to (provider-specific)
    pub zone_id: String,
    /// The record name
    pub name: String,
    /// The record type
    pub record_type: RecordType,
    /// The raw record content
    pub content: String,
    /// Time-to-live for the record
    pub ttl: Option<u32>,
    /// Whether the provider proxies traffic for this record
    pub proxied: Option<bool>,
}

impl RecordMetadata {
    /// The record content as an address, if it parses as one
    pub fn ip(&self) -> Option<IpAddr> {
        self.content.parse().ok()
    }

    /// Whether the record already points at `ip`
    pub fn points_at(&self, ip: IpAddr) -> bool {
        self.ip() == Some(ip)
    }
}

/// Trait for DNS provider implementations
///
/// Providers execute single API operations. Retries and the decision
/// whether an update is needed belong to `UpdateEngine`.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Check that the configured credentials are accepted
    async fn verify(&self) -> Result<(), crate::Error>;

    /// Get current metadata for a DNS record
    ///
    /// # Returns
    ///
    /// - `Ok(RecordMetadata)`: The record's current metadata
    /// - `Err(Error::NotFound)`: If no such record exists
    /// - `Err(Error)`: If the request failed
    async fn get_record(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<RecordMetadata, crate::Error>;

    /// Overwrite the content of an existing record
    ///
    /// The write is sent even when the record already holds `new_ip`; the
    /// engine decides whether an update is needed.
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResult)`: The result of the update operation
    /// - `Err(Error)`: If the record is missing or the update failed
    async fn update_record(
        &self,
        record_name: &str,
        record_type: RecordType,
        new_ip: IpAddr,
    ) -> Result<UpdateResult, crate::Error>;

    /// Called by the engine before each pass that reads records
    ///
    /// Providers that cache records drop the cache here so every pass sees
    /// the current content.
    async fn begin_pass(&self) {}

    /// Get the provider name (for logging)
    fn provider_name(&self) -> &'static str;
}
