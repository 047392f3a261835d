//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mutation coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Capacity of the notification broadcast channel
    pub notification_capacity: usize,
    /// Deadline for one remote call in milliseconds (no deadline if unset)
    pub remote_timeout_ms: Option<u64>,
    /// Run `collect_unused` on the cache after each settlement
    pub collect_after_settle: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            notification_capacity: 64,
            remote_timeout_ms: None,
            collect_after_settle: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With notification channel capacity (at least 1)
    #[must_use]
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity.max(1);
        self
    }

    /// With remote call deadline
    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// With or without collection after settlement
    #[must_use]
    pub fn with_collect_after_settle(mut self, enabled: bool) -> Self {
        self.collect_after_settle = enabled;
        self
    }

    /// Remote call deadline
    #[inline]
    #[must_use]
    pub fn remote_timeout(&self) -> Option<Duration> {
        self.remote_timeout_ms.map(Duration::from_millis)
    }
}
