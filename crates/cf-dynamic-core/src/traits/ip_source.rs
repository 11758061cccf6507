// # IP Source Trait
//
// Defines the interface for discovering the host's public address.
//
// ## Implementations
//
// - HTTP (icanhazip-style echo services): `cf-dynamic-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cf_dynamic_core::IpSource;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     // Get current public address
//     let current_ip = source.current().await?;
//
//     // Watch for changes
//     let mut stream = source.watch();
//     while let Some(change) = stream.next().await {
//         println!("IP changed: {:?}", change);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::pin::Pin;
use tokio_stream::Stream;

/// Represents a detected public address change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpChangeEvent {
    /// The new IP address
    pub new_ip: IpAddr,
    /// The previous IP address (if known)
    pub previous_ip: Option<IpAddr>,
    /// Which IP version this change affects
    pub version: IpVersion,
}

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Version of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// Whether `ip` belongs to this version
    pub fn matches(&self, ip: &IpAddr) -> bool {
        Self::of(ip) == *self
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

impl IpChangeEvent {
    /// Create a new IP change event
    pub fn new(new_ip: IpAddr, previous_ip: Option<IpAddr>) -> Self {
        Self {
            new_ip,
            previous_ip,
            version: IpVersion::of(&new_ip),
        }
    }
}

/// Trait for public address discovery
///
/// Sources are observers: they report the address, the engine decides what
/// to do with it. They must not touch DNS records or the state store.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current address
    /// - `Err(Error)`: If the address could not be determined
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Watch for address changes
    ///
    /// Returns a stream yielding an `IpChangeEvent` whenever the observed
    /// address differs from the previously observed one. Dropping the
    /// stream stops the watch.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = IpChangeEvent> + Send + 'static>>;

    /// The IP version this source reports, `None` for dual-stack sources
    fn version(&self) -> Option<IpVersion> {
        None
    }
}
