//! Optimistic projection
//!
//! A [`Projector`] computes what an entity should look like if a mutation
//! succeeds, before the server answers. Projections must be pure and
//! deterministic: the coordinator relies on being able to invert them with the
//! pre-mutation snapshot.

use crate::request::MutationRequest;
use vigil_cache::FieldMap;

/// Speculative snapshot computation
pub trait Projector: Send + Sync + std::fmt::Debug {
    /// Full speculative field set for `current` after `request`
    ///
    /// Must not depend on anything but its inputs.
    fn project(&self, current: &FieldMap, request: &MutationRequest) -> FieldMap;

    /// Projector name (for logs)
    fn name(&self) -> &'static str;
}

/// Overlay the requested patch on the current fields
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeProjector;

impl MergeProjector {
    /// Create merge projector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Projector for MergeProjector {
    fn project(&self, current: &FieldMap, request: &MutationRequest) -> FieldMap {
        let mut speculative = current.clone();
        for (k, v) in request.field_patch() {
            speculative.insert(k.clone(), v.clone());
        }
        speculative
    }

    fn name(&self) -> &'static str {
        "Merge"
    }
}

/// Restrict a speculative record to the fields a request touches
///
/// This is what the coordinator lays as overlay; untouched fields stay on the
/// authoritative layer.
#[must_use]
pub fn touched_projection(speculative: &FieldMap, request: &MutationRequest) -> FieldMap {
    request
        .touched_fields()
        .filter_map(|k| speculative.get(k).map(|v| (k.to_string(), v.clone())))
        .collect()
}
