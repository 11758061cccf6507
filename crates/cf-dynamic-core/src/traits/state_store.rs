// # State Store Trait
//
// Defines the interface for persisting the outcome of the last successful
// update run.
//
// ## Purpose
//
// The stored addresses and timestamp let `update` return early when nothing
// changed, so a frequent cron/systemd timer does not hit the provider API on
// every tick. A refresh is still forced once the stored timestamp is older
// than the engine's refresh interval.
//
// ## Implementations
//
// - `ConfStateStore`: keys `last_ipv4`, `last_ipv6`, `last_update` in the
//   configuration file
// - `MemoryStateStore`: non-persistent, for tests and daemon experiments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Snapshot of the last successful update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateState {
    /// IPv4 address observed by the last run (`None` if unavailable)
    pub last_ipv4: Option<Ipv4Addr>,
    /// IPv6 address observed by the last run (`None` if unavailable)
    pub last_ipv6: Option<Ipv6Addr>,
    /// When the last run finished
    pub last_update: Option<DateTime<Utc>>,
}

impl UpdateState {
    /// Create a state for addresses observed at `now`
    pub fn observed(
        last_ipv4: Option<Ipv4Addr>,
        last_ipv6: Option<Ipv6Addr>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            last_ipv4,
            last_ipv6,
            last_update: Some(now),
        }
    }

    /// Whether both stored addresses equal the observed ones
    pub fn matches(&self, ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> bool {
        self.last_update.is_some() && self.last_ipv4 == ipv4 && self.last_ipv6 == ipv6
    }

    /// Whether the last update is younger than `max_age` at `now`
    pub fn is_fresh(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(at) => at + max_age > now,
            None => false,
        }
    }
}

/// Trait for state store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the stored state; an absent state is `UpdateState::default()`
    async fn load(&self) -> Result<UpdateState, crate::Error>;

    /// Replace the stored state
    async fn save(&self, state: &UpdateState) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Forget the last run so the next pass compares every record
    async fn clear(&self) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_freshness_window() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let state = UpdateState::observed(None, None, at);
        let window = chrono::Duration::hours(12);

        assert!(state.is_fresh(window, at + chrono::Duration::hours(11)));
        assert!(!state.is_fresh(window, at + chrono::Duration::hours(12)));
        assert!(!UpdateState::default().is_fresh(window, at));
    }

    #[test]
    fn test_matches_requires_previous_run() {
        let v4: Ipv4Addr = "198.51.100.7".parse().unwrap();
        assert!(!UpdateState::default().matches(None, None));

        let state = UpdateState::observed(Some(v4), None, Utc::now());
        assert!(state.matches(Some(v4), None));
        assert!(!state.matches(None, None));
    }
}
