// # cf-dynamic-core
//
// Core library for cf-dynamic, a dynamic DNS updater for Cloudflare.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for discovering and monitoring the public address
// - **DnsProvider**: Trait for reading and overwriting address records
// - **StateStore**: Trait for remembering the last observed addresses
// - **UpdateEngine**: Orchestrates discovery → comparison → record update
// - **ConfFile** / **Settings**: the `key=value` configuration file and the
//   effective settings derived from it
// - **DomainStore**: the JSON list of managed domains
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Library-First**: The CLI is a thin layer over this crate
// 3. **Idempotency**: Unchanged addresses do not produce API writes

pub mod traits;
pub mod engine;
pub mod config;
pub mod conf;
pub mod domains;
pub mod settings;
pub mod suffix;
pub mod error;
pub mod state;

mod atomic;

// Re-export core types for convenience
pub use traits::{DnsProvider, IpSource, IpVersion, RecordType, StateStore};
pub use engine::{EngineEvent, IpSources, UpdateEngine, UpdateReport};
pub use config::{EngineConfig, IpSourceConfig};
pub use conf::ConfFile;
pub use domains::{DomainRegistration, DomainStore};
pub use settings::{Overrides, Settings};
pub use error::{Error, Result};
pub use state::{ConfStateStore, MemoryStateStore};
