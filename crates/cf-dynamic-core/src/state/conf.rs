// # Config-File State Store
//
// Persists `UpdateState` as three keys of the configuration file:
//
// ```text
// last_ipv4=198.51.100.7
// last_ipv6=2001:db8::7
// last_update=1735689600
// ```
//
// An unavailable address family is stored as an empty value. Values that do
// not parse are treated as absent (with a warning), which only costs one
// extra update run.
//
// ## Durability
//
// `save` rewrites the file immediately (atomic rename). If the write fails
// the state stays dirty and `flush` retries it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::conf::{ConfFile, KEY_LAST_IPV4, KEY_LAST_IPV6, KEY_LAST_UPDATE};
use crate::traits::state_store::{StateStore, UpdateState};

/// State store backed by the `key=value` configuration file
#[derive(Debug, Clone)]
pub struct ConfStateStore {
    path: PathBuf,
    pending: Arc<RwLock<Option<UpdateState>>>,
}

impl ConfStateStore {
    /// Create a store for the configuration file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pending: Arc::new(RwLock::new(None)),
        }
    }

    /// Path of the backing configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract the state keys from a parsed configuration
    pub fn state_from(conf: &ConfFile) -> UpdateState {
        UpdateState {
            last_ipv4: parse_entry(conf, KEY_LAST_IPV4),
            last_ipv6: parse_entry(conf, KEY_LAST_IPV6),
            last_update: parse_entry::<i64>(conf, KEY_LAST_UPDATE)
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }

    async fn write(&self, state: &UpdateState) -> Result<(), Error> {
        let mut conf = ConfFile::load(&self.path).await?;

        conf.set(
            KEY_LAST_IPV4,
            state.last_ipv4.map(|ip| ip.to_string()).unwrap_or_default(),
        );
        conf.set(
            KEY_LAST_IPV6,
            state.last_ipv6.map(|ip| ip.to_string()).unwrap_or_default(),
        );
        conf.set(
            KEY_LAST_UPDATE,
            state
                .last_update
                .map(|at| at.timestamp().to_string())
                .unwrap_or_default(),
        );

        conf.save(&self.path)
            .await
            .map_err(|e| Error::state_store(format!("Failed to persist update state: {}", e)))
    }
}

fn parse_entry<T: std::str::FromStr>(conf: &ConfFile, key: &str) -> Option<T> {
    let raw = conf.get(key)?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable config value {}={}", key, raw);
            None
        }
    }
}

#[async_trait]
impl StateStore for ConfStateStore {
    async fn load(&self) -> Result<UpdateState, Error> {
        if let Some(state) = self.pending.read().await.as_ref() {
            return Ok(state.clone());
        }

        let conf = ConfFile::load(&self.path).await?;
        Ok(Self::state_from(&conf))
    }

    async fn save(&self, state: &UpdateState) -> Result<(), Error> {
        *self.pending.write().await = Some(state.clone());

        self.write(state).await?;

        *self.pending.write().await = None;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let pending = self.pending.read().await.clone();
        match pending {
            Some(state) => {
                self.write(&state).await?;
                *self.pending.write().await = None;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.pending.write().await = None;

        let mut conf = ConfFile::load(&self.path).await?;
        if conf.get(KEY_LAST_UPDATE).is_none_or(str::is_empty) {
            return Ok(());
        }

        conf.set(KEY_LAST_UPDATE, "");
        conf.save(&self.path)
            .await
            .map_err(|e| Error::state_store(format!("Failed to reset update state: {}", e)))
    }
}
