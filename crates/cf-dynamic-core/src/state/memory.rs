// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple state store that doesn't persist across restarts.
// Useful for testing and for `daemon` runs that should always refresh on
// start.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First run after a restart updates every record whose content differs

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateStore, UpdateState};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use cf_dynamic_core::state::MemoryStateStore;
/// use cf_dynamic_core::traits::{StateStore, UpdateState};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///
///     let state = UpdateState::observed(Some("198.51.100.7".parse()?), None, chrono::Utc::now());
///     store.save(&state).await?;
///
///     assert_eq!(store.load().await?, state);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<UpdateState>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `state`
    pub fn with_state(state: UpdateState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<UpdateState, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, state: &UpdateState) -> Result<(), Error> {
        *self.inner.write().await = state.clone();
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.inner.write().await = UpdateState::default();
        Ok(())
    }
}
