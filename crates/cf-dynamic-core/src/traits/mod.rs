//! Core traits for cf-dynamic
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Discover the public address and watch it for changes
//! - [`DnsProvider`]: Read and overwrite address records via provider APIs
//! - [`StateStore`]: Persist the outcome of the last update run

pub mod ip_source;
pub mod dns_provider;
pub mod state_store;

pub use ip_source::{IpSource, IpChangeEvent, IpVersion};
pub use dns_provider::{DnsProvider, RecordMetadata, RecordType, UpdateResult};
pub use state_store::{StateStore, UpdateState};
