//! Process-wide normalized entity store
//!
//! [`EntityCache`] maps an [`EntityIdentity`] to its authoritative fields plus
//! at most one speculative overlay. All writes to one identity go through the
//! map's entry lock, so a merge is never observed half-applied and
//! subscribers see writes in the order they were applied.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, IdentityError};
use crate::identity::EntityIdentity;
use crate::overlay::{Layers, MutationId, OverlaySnapshot, Settled};
use crate::record::{EntityRecord, FieldMap};
use crate::subscription::{CacheEvent, ChangeKind, CollectionSubscription, EntitySubscription};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, watch};

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Records currently held
    pub entry_count: usize,
    /// Records with an unresolved overlay
    pub speculative_count: usize,
    /// Live entity subscriptions
    pub entity_subscribers: usize,
    /// Live collection subscriptions
    pub collection_subscribers: usize,
    /// Records removed since creation
    pub evicted_total: u64,
}

#[derive(Debug)]
struct StoredEntity {
    layers: Layers,
    /// False for placeholders created by early subscribers
    present: bool,
    /// An authoritative write reached this record
    confirmed: bool,
    revision: u64,
    watch: watch::Sender<Option<EntityRecord>>,
}

impl StoredEntity {
    fn vacant() -> Self {
        let (watch, _) = watch::channel(None);
        Self {
            layers: Layers::default(),
            present: false,
            confirmed: false,
            revision: 0,
            watch,
        }
    }

    fn observable(&self) -> FieldMap {
        if self.present {
            self.layers.observable()
        } else {
            FieldMap::new()
        }
    }

    fn record(&self, identity: &EntityIdentity) -> Option<EntityRecord> {
        self.present.then(|| {
            EntityRecord::new(
                identity.clone(),
                self.layers.observable(),
                self.layers.is_speculative(),
                self.revision,
            )
        })
    }
}

/// Normalized entity cache
///
/// Shared by handle (`Arc<EntityCache>`); created at session start and torn
/// down with the session.
#[derive(Debug)]
pub struct EntityCache {
    entities: DashMap<EntityIdentity, StoredEntity>,
    collections: DashMap<String, broadcast::Sender<CacheEvent>>,
    config: CacheConfig,
    evicted_total: AtomicU64,
}

impl EntityCache {
    /// Create new cache
    #[inline]
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entities: DashMap::new(),
            collections: DashMap::new(),
            config,
            evicted_total: AtomicU64::new(0),
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Normalize and validate an identity
    ///
    /// # Errors
    /// Any [`IdentityError`] raised by normalization
    #[inline]
    pub fn identify(&self, identity: &EntityIdentity) -> Result<EntityIdentity, IdentityError> {
        identity.normalized()
    }

    /// Resolve identity of an object through the configured type policies
    ///
    /// # Errors
    /// `IdentityError::MissingKeyField` and friends when the object has no
    /// usable key
    #[inline]
    pub fn identify_object(
        &self,
        type_name: &str,
        fields: &FieldMap,
    ) -> Result<EntityIdentity, IdentityError> {
        self.config.type_policies.identify_object(type_name, fields)
    }

    /// Read observable record (`None` if not cached)
    #[must_use]
    pub fn read(&self, identity: &EntityIdentity) -> Option<EntityRecord> {
        let identity = self.identify(identity).ok()?;
        self.entities
            .get(&identity)
            .and_then(|entity| entity.record(&identity))
    }

    /// Check if a record is cached
    #[inline]
    #[must_use]
    pub fn contains(&self, identity: &EntityIdentity) -> bool {
        self.read(identity).is_some()
    }

    /// Merge authoritative fields into a record, creating it if absent
    ///
    /// Patched fields supersede any speculative value for the same field.
    /// Subscribers are notified before this returns.
    ///
    /// # Errors
    /// `CacheError::InvalidIdentity` for malformed identities
    pub fn patch(&self, identity: &EntityIdentity, patch: &FieldMap) -> CacheResult<EntityRecord> {
        let identity = self.identify(identity)?;
        let mut entity = self
            .entities
            .entry(identity.clone())
            .or_insert_with(StoredEntity::vacant);

        entity.layers.merge_authoritative(patch);
        entity.confirmed = true;
        tracing::debug!(%identity, fields = patch.len(), "authoritative patch");
        Ok(self.publish(&identity, &mut entity, ChangeKind::Patched))
    }

    /// Resolve an object's identity and patch it in
    ///
    /// # Errors
    /// `CacheError::InvalidIdentity` when the object has no usable key
    pub fn write_object(&self, type_name: &str, fields: &FieldMap) -> CacheResult<EntityIdentity> {
        let identity = self.identify_object(type_name, fields)?;
        self.patch(&identity, fields)?;
        Ok(identity)
    }

    /// Lay speculative fields for a pending mutation
    ///
    /// Creates the record if absent. The returned snapshot captures the
    /// pre-mutation state of every touched field.
    ///
    /// # Errors
    /// - `CacheError::InvalidIdentity` for malformed identities
    /// - `CacheError::DuplicateOverlay` if `mutation` is already pending here
    pub fn apply_overlay(
        &self,
        identity: &EntityIdentity,
        mutation: MutationId,
        speculative: &FieldMap,
    ) -> CacheResult<OverlaySnapshot> {
        self.apply_projected_overlay(identity, mutation, |_| speculative.clone())
    }

    /// Lay an overlay computed from the current observable fields
    ///
    /// `project` runs under the record's entry lock, so no other write to
    /// this identity can land between reading the fields and laying the
    /// overlay. It receives an empty map for uncached records and must not
    /// touch the cache itself.
    ///
    /// # Errors
    /// Same as [`EntityCache::apply_overlay`]
    pub fn apply_projected_overlay<F>(
        &self,
        identity: &EntityIdentity,
        mutation: MutationId,
        project: F,
    ) -> CacheResult<OverlaySnapshot>
    where
        F: FnOnce(&FieldMap) -> FieldMap,
    {
        let identity = self.identify(identity)?;
        let mut entity = self
            .entities
            .entry(identity.clone())
            .or_insert_with(StoredEntity::vacant);

        let speculative = project(&entity.observable());
        let snapshot = entity
            .layers
            .apply_overlay(mutation, &speculative)
            .ok_or_else(|| CacheError::DuplicateOverlay {
                identity: identity.to_string(),
                mutation,
            })?;

        tracing::debug!(%identity, %mutation, fields = speculative.len(), "overlay applied");
        self.publish(&identity, &mut entity, ChangeKind::Overlaid);
        Ok(snapshot)
    }

    /// Settle a pending mutation with authoritative server fields
    ///
    /// Server fields win over every overlay value for the same field; overlay
    /// fields still owned by `mutation` are dropped. The server fields are
    /// merged even when `mutation` is no longer pending (the record was
    /// evicted, and possibly refetched, while the mutation was in flight).
    ///
    /// # Errors
    /// `CacheError::InvalidIdentity` for malformed identities
    pub fn settle_success(
        &self,
        identity: &EntityIdentity,
        mutation: MutationId,
        authoritative: &FieldMap,
    ) -> CacheResult<EntityRecord> {
        let identity = self.identify(identity)?;
        let mut entity = self
            .entities
            .entry(identity.clone())
            .or_insert_with(StoredEntity::vacant);

        if entity.layers.settle_success(mutation, authoritative) == Settled::NotPending {
            tracing::debug!(%identity, %mutation, "settling a mutation whose overlay was dropped");
        }
        entity.confirmed = true;
        tracing::debug!(%identity, %mutation, fields = authoritative.len(), "reconciled");
        Ok(self.publish(&identity, &mut entity, ChangeKind::Reconciled))
    }

    /// Revert the speculative fields of a failed mutation
    ///
    /// Returns `None` when there is nothing left to show: the record was
    /// evicted meanwhile, or it only ever held this mutation's overlay and
    /// is gone again.
    ///
    /// # Errors
    /// `CacheError::InvalidIdentity` for malformed identities
    pub fn settle_failure(
        &self,
        identity: &EntityIdentity,
        snapshot: &OverlaySnapshot,
    ) -> CacheResult<Option<EntityRecord>> {
        let identity = self.identify(identity)?;
        let Some(mut entity) = self.entities.get_mut(&identity) else {
            return Ok(None);
        };
        if !entity.present {
            return Ok(None);
        }

        let mutation = snapshot.mutation();
        if entity.layers.settle_failure(snapshot) == Settled::NotPending {
            tracing::debug!(%identity, %mutation, "overlay already dropped, nothing to revert");
            return Ok(None);
        }

        tracing::debug!(%identity, %mutation, "rolled back");
        if !entity.confirmed && entity.layers.is_empty() {
            self.vacate(&identity, &mut entity, ChangeKind::RolledBack);
            return Ok(None);
        }
        Ok(Some(self.publish(&identity, &mut entity, ChangeKind::RolledBack)))
    }

    /// Number of unresolved overlays on a record (0 or 1)
    #[must_use]
    pub fn overlay_count(&self, identity: &EntityIdentity) -> usize {
        self.identify(identity)
            .ok()
            .and_then(|identity| self.entities.get(&identity))
            .map_or(0, |entity| entity.layers.overlay_count())
    }

    /// Mutations currently pending on a record
    #[must_use]
    pub fn pending_mutations(&self, identity: &EntityIdentity) -> Vec<MutationId> {
        self.identify(identity)
            .ok()
            .and_then(|identity| self.entities.get(&identity))
            .map(|entity| entity.layers.pending())
            .unwrap_or_default()
    }

    /// Subscribe to one entity
    ///
    /// The record does not need to exist yet; the subscription sees it once
    /// it is written.
    ///
    /// # Errors
    /// `CacheError::InvalidIdentity` for malformed identities
    pub fn subscribe(&self, identity: &EntityIdentity) -> CacheResult<EntitySubscription> {
        let identity = self.identify(identity)?;
        let entity = self
            .entities
            .entry(identity.clone())
            .or_insert_with(StoredEntity::vacant);
        let rx = entity.watch.subscribe();
        Ok(EntitySubscription::new(identity, rx))
    }

    /// Subscribe to every change of one entity type
    #[must_use]
    pub fn subscribe_collection(&self, type_name: &str) -> CollectionSubscription {
        let type_name = type_name.trim().to_string();
        let capacity = self.config.event_capacity.max(1);
        let rx = self
            .collections
            .entry(type_name.clone())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        CollectionSubscription::new(type_name, rx)
    }

    /// Remove records nothing references any more
    ///
    /// A record survives while it has an entity subscriber, a collection
    /// subscriber for its type, or a pending mutation. Returns the number of
    /// evicted records.
    pub fn collect_unused(&self) -> usize {
        let mut evicted = 0;
        self.entities.retain(|identity, entity| {
            let keep = entity.watch.receiver_count() > 0
                || entity.layers.is_speculative()
                || self.collection_alive(identity.type_name());
            if !keep && entity.present {
                evicted += 1;
            }
            keep
        });
        self.collections.retain(|_, tx| tx.receiver_count() > 0);

        if evicted > 0 {
            self.evicted_total.fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::debug!(evicted, remaining = self.entities.len(), "collected unused records");
        }
        evicted
    }

    /// Remove one record regardless of references
    ///
    /// Pending overlays are dropped with it; their later settlement recreates
    /// the record on success and is a no-op on failure. A record with live
    /// entity subscribers stays behind as a placeholder so they see it again
    /// once it is rewritten.
    pub fn evict(&self, identity: &EntityIdentity) -> bool {
        let Ok(identity) = self.identify(identity) else {
            return false;
        };
        {
            let Some(mut entity) = self.entities.get_mut(&identity) else {
                return false;
            };
            if !entity.present {
                return false;
            }
            self.vacate(&identity, &mut entity, ChangeKind::Evicted);
        }

        self.entities
            .remove_if(&identity, |_, e| !e.present && e.watch.receiver_count() == 0);
        self.evicted_total.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remove every record
    pub fn clear(&self) {
        let identities: Vec<EntityIdentity> =
            self.entities.iter().map(|e| e.key().clone()).collect();
        for identity in identities {
            self.evict(&identity);
        }
        self.entities.retain(|_, e| e.watch.receiver_count() > 0);
    }

    /// Number of cached records
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.iter().filter(|e| e.present).count()
    }

    /// Check if no record is cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            evicted_total: self.evicted_total.load(Ordering::Relaxed),
            ..CacheStats::default()
        };
        for entity in &self.entities {
            if entity.present {
                stats.entry_count += 1;
            }
            if entity.layers.is_speculative() {
                stats.speculative_count += 1;
            }
            stats.entity_subscribers += entity.watch.receiver_count();
        }
        stats.collection_subscribers = self.collections.iter().map(|tx| tx.receiver_count()).sum();
        stats
    }

    fn collection_alive(&self, type_name: &str) -> bool {
        self.collections
            .get(type_name)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    fn publish(
        &self,
        identity: &EntityIdentity,
        entity: &mut StoredEntity,
        kind: ChangeKind,
    ) -> EntityRecord {
        entity.present = true;
        entity.revision += 1;
        let record = EntityRecord::new(
            identity.clone(),
            entity.layers.observable(),
            entity.layers.is_speculative(),
            entity.revision,
        );

        entity.watch.send_replace(Some(record.clone()));
        self.emit(CacheEvent {
            identity: identity.clone(),
            kind,
            record: Some(record.clone()),
        });
        record
    }

    /// Turn a record back into a placeholder
    fn vacate(&self, identity: &EntityIdentity, entity: &mut StoredEntity, kind: ChangeKind) {
        entity.layers = Layers::default();
        entity.present = false;
        entity.confirmed = false;
        entity.revision += 1;
        entity.watch.send_replace(None);
        self.emit(CacheEvent {
            identity: identity.clone(),
            kind,
            record: None,
        });
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(tx) = self.collections.get(event.identity.type_name()) {
            // No receivers is fine; collect_unused prunes the sender later.
            let _ = tx.send(event);
        }
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
