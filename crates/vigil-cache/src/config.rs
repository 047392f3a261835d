//! Cache configuration

use crate::identity::TypePolicies;
use serde::{Deserialize, Serialize};

/// Entity cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Buffered change events per collection subscription
    pub event_capacity: usize,
    /// Key field policies per entity type
    pub type_policies: TypePolicies,
}

impl CacheConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With collection event capacity
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// With type policies
    #[inline]
    #[must_use]
    pub fn with_type_policies(mut self, policies: TypePolicies) -> Self {
        self.type_policies = policies;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            type_policies: TypePolicies::default(),
        }
    }
}
