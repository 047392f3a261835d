//! Authoritative and speculative layers of a cached entity
//!
//! Every entity carries one authoritative layer and at most one overlay. The
//! overlay is shared by all mutations pending on the entity. Each overlay
//! field keeps the chain of pending writers in the order they were applied;
//! the newest one is observable. A settlement removes only its own links, so
//! the value of a still-pending writer survives whatever settles around it.

use crate::record::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Unique mutation identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutationId(pub Ulid);

impl MutationId {
    /// Generate new mutation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MutationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of one field right before a mutation overlaid it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorValue {
    /// Observable value, `None` if the field was absent
    pub value: Option<Value>,
    /// Mutation owning the overlay value at that time, if any
    pub overlay_owner: Option<MutationId>,
}

/// Pre-mutation state of every field a mutation touched
///
/// Returned by `EntityCache::apply_overlay` and handed back to
/// `EntityCache::settle_failure` to invert the speculative write exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    mutation: MutationId,
    previous: BTreeMap<String, PriorValue>,
}

impl OverlaySnapshot {
    /// Mutation this snapshot belongs to
    #[inline]
    #[must_use]
    pub fn mutation(&self) -> MutationId {
        self.mutation
    }

    /// Per-field prior state
    #[inline]
    #[must_use]
    pub fn previous(&self) -> &BTreeMap<String, PriorValue> {
        &self.previous
    }

    /// Pre-mutation values of the touched fields that existed
    #[must_use]
    pub fn pre_mutation_fields(&self) -> FieldMap {
        self.previous
            .iter()
            .filter_map(|(k, prior)| prior.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }

    /// Names of the touched fields
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.previous.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OverlayField {
    owner: MutationId,
    value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Overlay {
    /// Writers per field, oldest first; never empty
    fields: BTreeMap<String, Vec<OverlayField>>,
    pending: BTreeSet<MutationId>,
}

impl Overlay {
    fn top(&self, field: &str) -> Option<&OverlayField> {
        self.fields.get(field).and_then(|chain| chain.last())
    }

    /// Drop every link written by `mutation`
    fn unlink(&mut self, mutation: MutationId) {
        self.fields.retain(|_, chain| {
            chain.retain(|f| f.owner != mutation);
            !chain.is_empty()
        });
    }
}

/// Outcome of a settlement against the layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    /// Mutation was pending and has been removed
    Applied,
    /// Mutation was not pending
    NotPending,
}

/// Authoritative layer plus optional overlay
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Layers {
    authoritative: FieldMap,
    overlay: Option<Overlay>,
}

impl Layers {
    /// Authoritative layer with the overlay applied
    pub(crate) fn observable(&self) -> FieldMap {
        let mut fields = self.authoritative.clone();
        if let Some(overlay) = &self.overlay {
            for (k, chain) in &overlay.fields {
                if let Some(top) = chain.last() {
                    fields.insert(k.clone(), top.value.clone());
                }
            }
        }
        fields
    }

    fn observable_field(&self, field: &str) -> Option<&Value> {
        self.overlay
            .as_ref()
            .and_then(|o| o.top(field))
            .map(|f| &f.value)
            .or_else(|| self.authoritative.get(field))
    }

    pub(crate) fn is_speculative(&self) -> bool {
        self.overlay.is_some()
    }

    /// No authoritative field and no overlay
    pub(crate) fn is_empty(&self) -> bool {
        self.authoritative.is_empty() && self.overlay.is_none()
    }

    pub(crate) fn overlay_count(&self) -> usize {
        usize::from(self.overlay.is_some())
    }

    pub(crate) fn is_pending(&self, mutation: MutationId) -> bool {
        self.overlay
            .as_ref()
            .is_some_and(|o| o.pending.contains(&mutation))
    }

    pub(crate) fn pending(&self) -> Vec<MutationId> {
        self.overlay
            .as_ref()
            .map(|o| o.pending.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Authoritative merge; patched fields drop any overlay value
    pub(crate) fn merge_authoritative(&mut self, patch: &FieldMap) {
        for (k, v) in patch {
            self.authoritative.insert(k.clone(), v.clone());
        }
        if let Some(overlay) = &mut self.overlay {
            overlay.fields.retain(|k, _| !patch.contains_key(k));
        }
    }

    /// Lay speculative fields for `mutation`, returning the prior state
    ///
    /// Returns `None` if `mutation` already holds an overlay here.
    pub(crate) fn apply_overlay(
        &mut self,
        mutation: MutationId,
        speculative: &FieldMap,
    ) -> Option<OverlaySnapshot> {
        if self.is_pending(mutation) {
            return None;
        }

        let previous: BTreeMap<String, PriorValue> = speculative
            .keys()
            .map(|k| {
                let prior = PriorValue {
                    value: self.observable_field(k).cloned(),
                    overlay_owner: self
                        .overlay
                        .as_ref()
                        .and_then(|o| o.top(k))
                        .map(|f| f.owner),
                };
                (k.clone(), prior)
            })
            .collect();

        let overlay = self.overlay.get_or_insert_with(Overlay::default);
        overlay.pending.insert(mutation);
        for (k, v) in speculative {
            overlay.fields.entry(k.clone()).or_default().push(OverlayField {
                owner: mutation,
                value: v.clone(),
            });
        }

        Some(OverlaySnapshot { mutation, previous })
    }

    /// Resolve `mutation` with authoritative server fields
    ///
    /// The server fields are merged even if `mutation` is no longer pending.
    pub(crate) fn settle_success(
        &mut self,
        mutation: MutationId,
        authoritative: &FieldMap,
    ) -> Settled {
        let settled = self.release(mutation);
        if let Some(overlay) = &mut self.overlay {
            overlay.unlink(mutation);
        }
        self.merge_authoritative(authoritative);
        self.drop_empty_overlay();
        settled
    }

    /// Revert the links `snapshot.mutation` still holds
    ///
    /// Each touched field falls back to the newest remaining pending writer,
    /// or to the authoritative value when none is left.
    pub(crate) fn settle_failure(&mut self, snapshot: &OverlaySnapshot) -> Settled {
        let settled = self.release(snapshot.mutation);
        if let Some(overlay) = &mut self.overlay {
            overlay.unlink(snapshot.mutation);
        }
        self.drop_empty_overlay();
        settled
    }

    fn release(&mut self, mutation: MutationId) -> Settled {
        if let Some(overlay) = &mut self.overlay {
            if overlay.pending.remove(&mutation) {
                return Settled::Applied;
            }
        }
        Settled::NotPending
    }

    fn drop_empty_overlay(&mut self) {
        if self.overlay.as_ref().is_some_and(|o| o.pending.is_empty()) {
            self.overlay = None;
        }
    }
}
