//! Observable entity records

use crate::identity::EntityIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name -> value, ordered for deterministic comparison
pub type FieldMap = BTreeMap<String, Value>;

/// Entity as seen by readers and subscribers
///
/// The field set is the authoritative layer with the overlay (if any) laid on
/// top. `speculative` is set while at least one mutation on the entity is
/// unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    identity: EntityIdentity,
    fields: FieldMap,
    speculative: bool,
    revision: u64,
}

impl EntityRecord {
    pub(crate) fn new(
        identity: EntityIdentity,
        fields: FieldMap,
        speculative: bool,
        revision: u64,
    ) -> Self {
        Self {
            identity,
            fields,
            speculative,
            revision,
        }
    }

    /// Identity of this record
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    /// Observable fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Consume record, keeping only its fields
    #[inline]
    #[must_use]
    pub fn into_fields(self) -> FieldMap {
        self.fields
    }

    /// Look up a single field
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Look up a string field
    #[inline]
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Whether an unresolved overlay is present
    #[inline]
    #[must_use]
    pub fn is_speculative(&self) -> bool {
        self.speculative
    }

    /// Per-entity write counter, bumped on every published change
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Build a [`FieldMap`] from `(name, value)` pairs
pub fn fields<I, K, V>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
