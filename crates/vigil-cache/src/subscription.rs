//! Entity and collection subscriptions
//!
//! - [`EntitySubscription`]: latest value of one identity (watch semantics,
//!   intermediate values may be coalesced)
//! - [`CollectionSubscription`]: every change event for one entity type

use crate::error::CacheError;
use crate::identity::EntityIdentity;
use crate::record::EntityRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Kind of change published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Authoritative patch
    Patched,
    /// Speculative overlay laid
    Overlaid,
    /// Mutation settled with server data
    Reconciled,
    /// Mutation reverted after failure
    RolledBack,
    /// Record removed from cache
    Evicted,
}

/// Change event delivered to collection subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEvent {
    /// Changed identity
    pub identity: EntityIdentity,
    /// What happened
    pub kind: ChangeKind,
    /// Record after the change (`None` once the record is gone)
    pub record: Option<EntityRecord>,
}

/// Subscription to a single entity
///
/// Holding the subscription keeps the record alive across
/// `EntityCache::collect_unused`.
#[derive(Debug)]
pub struct EntitySubscription {
    identity: EntityIdentity,
    rx: watch::Receiver<Option<EntityRecord>>,
}

impl EntitySubscription {
    pub(crate) fn new(identity: EntityIdentity, rx: watch::Receiver<Option<EntityRecord>>) -> Self {
        Self { identity, rx }
    }

    /// Subscribed identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    /// Latest record, marking it seen
    #[must_use]
    pub fn current(&mut self) -> Option<EntityRecord> {
        self.rx.borrow_and_update().clone()
    }

    /// Latest record without marking it seen
    #[must_use]
    pub fn peek(&self) -> Option<EntityRecord> {
        self.rx.borrow().clone()
    }

    /// Whether a change arrived since the last `current`/`changed`
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next change and return the new record
    ///
    /// # Errors
    /// `CacheError::SubscriptionClosed` once the cache dropped the entity
    /// channel (cache torn down).
    pub async fn changed(&mut self) -> Result<Option<EntityRecord>, CacheError> {
        self.rx
            .changed()
            .await
            .map_err(|_| CacheError::SubscriptionClosed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

/// Subscription to every record of one entity type
///
/// Keeps all records of the type alive across garbage collection.
#[derive(Debug)]
pub struct CollectionSubscription {
    type_name: String,
    rx: broadcast::Receiver<CacheEvent>,
}

impl CollectionSubscription {
    pub(crate) fn new(type_name: String, rx: broadcast::Receiver<CacheEvent>) -> Self {
        Self { type_name, rx }
    }

    /// Subscribed type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Wait for the next event
    ///
    /// Lagged receivers skip the dropped events and keep receiving.
    ///
    /// # Errors
    /// `CacheError::SubscriptionClosed` once the cache dropped the channel.
    pub async fn recv(&mut self) -> Result<CacheEvent, CacheError> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(type_name = %self.type_name, skipped, "collection subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(CacheError::SubscriptionClosed)
                }
            }
        }
    }

    /// Take an event if one is buffered
    #[must_use]
    pub fn try_recv(&mut self) -> Option<CacheEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
