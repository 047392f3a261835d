//! Application session: explicit owner of one cache and one coordinator

use crate::config::CoordinatorConfig;
use crate::coordinator::MutationCoordinator;
use crate::projector::Projector;
use crate::remote::RemoteApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vigil_cache::{CacheConfig, EntityCache};

/// Session configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cache settings
    pub cache: CacheConfig,
    /// Coordinator settings
    pub coordinator: CoordinatorConfig,
}

impl SessionConfig {
    /// With cache settings
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// With coordinator settings
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = coordinator;
        self
    }
}

/// One console session
#[derive(Debug)]
pub struct Session {
    cache: Arc<EntityCache>,
    coordinator: Arc<MutationCoordinator>,
}

impl Session {
    /// Start a session against a remote API
    #[must_use]
    pub fn start(config: SessionConfig, remote: Arc<dyn RemoteApi>) -> Self {
        let cache = Arc::new(EntityCache::new(config.cache));
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&cache),
            remote,
            config.coordinator,
        ));
        tracing::info!("session started");
        Self { cache, coordinator }
    }

    /// Start a session with a custom projector
    #[must_use]
    pub fn start_with_projector(
        config: SessionConfig,
        remote: Arc<dyn RemoteApi>,
        projector: Arc<dyn Projector>,
    ) -> Self {
        let cache = Arc::new(EntityCache::new(config.cache));
        let coordinator = Arc::new(MutationCoordinator::with_projector(
            Arc::clone(&cache),
            remote,
            projector,
            config.coordinator,
        ));
        Self { cache, coordinator }
    }

    /// Session cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Session coordinator
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &Arc<MutationCoordinator> {
        &self.coordinator
    }

    /// Settle every in-flight mutation, then clear the cache
    pub async fn shutdown(self) {
        self.coordinator.drain().await;
        let stats = self.cache.stats();
        self.cache.clear();
        tracing::info!(entries = stats.entry_count, "session shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::request::MutationRequest;
    use async_trait::async_trait;
    use std::time::Duration;
    use vigil_cache::{fields, EntityIdentity, FieldMap};

    #[derive(Debug)]
    struct Slow;

    #[async_trait]
    impl RemoteApi for Slow {
        async fn execute(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(request.field_patch().clone())
        }
    }

    #[tokio::test]
    async fn shutdown_drains_then_clears() {
        let session = Session::start(SessionConfig::default(), Arc::new(Slow));
        let alert = EntityIdentity::new("Alert", "a1");
        session.cache().patch(&alert, &fields([("status", "OPEN")])).unwrap();

        let mut notifications = session.coordinator().notifications();
        let handle = session
            .coordinator()
            .submit(MutationRequest::new(alert, fields([("status", "CLOSED")])));
        drop(handle);

        let cache = Arc::clone(session.cache());
        session.shutdown().await;

        assert!(cache.is_empty());
        assert!(!notifications.recv().await.unwrap().is_error());
    }
}
