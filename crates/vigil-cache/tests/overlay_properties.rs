//! Property tests for overlay bookkeeping.
//!
//! Random interleavings of overlays and settlements on a single record must
//! keep at most one overlay, a record whose mutations all failed must read
//! exactly as it did before they started, and failures never hide the value
//! of a writer that is still pending.

use proptest::prelude::*;
use serde_json::Value;
use vigil_cache::{EntityCache, EntityIdentity, FieldMap, MutationId, OverlaySnapshot};

const FIELDS: [&str; 3] = ["status", "assignee", "severity"];

fn field_patch() -> impl Strategy<Value = FieldMap> {
    prop::collection::btree_map(
        prop::sample::select(FIELDS.to_vec()).prop_map(str::to_string),
        "[A-Z]{1,6}".prop_map(Value::String),
        1..=FIELDS.len(),
    )
}

fn base_record() -> impl Strategy<Value = FieldMap> {
    prop::collection::btree_map(
        prop::sample::select(FIELDS.to_vec()).prop_map(str::to_string),
        "[a-z]{1,6}".prop_map(Value::String),
        0..=FIELDS.len(),
    )
}

#[derive(Debug, Clone)]
enum Step {
    Overlay(FieldMap),
    Fail(usize),
    Succeed(usize, FieldMap),
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            field_patch().prop_map(Step::Overlay),
            any::<usize>().prop_map(Step::Fail),
            (any::<usize>(), field_patch()).prop_map(|(i, f)| Step::Succeed(i, f)),
        ],
        1..24,
    )
}

fn identity() -> EntityIdentity {
    EntityIdentity::new("Alert", "a1")
}

fn status(value: &str) -> FieldMap {
    let mut patch = FieldMap::new();
    patch.insert("status".to_string(), Value::String(value.to_string()));
    patch
}

proptest! {
    #[test]
    fn never_more_than_one_overlay(base in base_record(), steps in steps()) {
        let cache = EntityCache::default();
        cache.patch(&identity(), &base).unwrap();
        let mut pending: Vec<OverlaySnapshot> = Vec::new();

        for step in steps {
            match step {
                Step::Overlay(patch) => {
                    let snapshot = cache.apply_overlay(&identity(), MutationId::new(), &patch).unwrap();
                    pending.push(snapshot);
                }
                Step::Fail(i) if !pending.is_empty() => {
                    let snapshot = pending.remove(i % pending.len());
                    cache.settle_failure(&identity(), &snapshot).unwrap();
                }
                Step::Succeed(i, server) if !pending.is_empty() => {
                    let snapshot = pending.remove(i % pending.len());
                    let record = cache.settle_success(&identity(), snapshot.mutation(), &server).unwrap();
                    for (k, v) in &server {
                        prop_assert_eq!(record.get(k), Some(v));
                    }
                }
                _ => {}
            }

            prop_assert!(cache.overlay_count(&identity()) <= 1);
            prop_assert_eq!(cache.pending_mutations(&identity()).len(), pending.len());
        }
    }

    #[test]
    fn all_failures_restore_base(base in base_record(), patches in prop::collection::vec(field_patch(), 1..6), order in any::<u64>()) {
        let cache = EntityCache::default();
        cache.patch(&identity(), &base).unwrap();

        let mut snapshots: Vec<OverlaySnapshot> = patches
            .iter()
            .map(|p| cache.apply_overlay(&identity(), MutationId::new(), p).unwrap())
            .collect();

        // Settle in a pseudo-random order derived from `order`.
        let mut seed = order;
        while !snapshots.is_empty() {
            let idx = (seed % snapshots.len() as u64) as usize;
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let snapshot = snapshots.remove(idx);
            cache.settle_failure(&identity(), &snapshot).unwrap();
        }

        let record = cache.read(&identity()).unwrap();
        prop_assert_eq!(record.fields(), &base);
        prop_assert!(!record.is_speculative());
    }

    #[test]
    fn pending_writer_survives_other_failures(
        base in base_record(),
        values in prop::collection::vec("[A-Z]{1,6}", 3..6),
        order in any::<u64>(),
    ) {
        let cache = EntityCache::default();
        cache.patch(&identity(), &base).unwrap();

        let survivor = MutationId::new();
        cache
            .apply_overlay(&identity(), survivor, &status(&values[0]))
            .unwrap();
        // Kept in apply order; the last entry is the newest writer.
        let mut failing: Vec<(OverlaySnapshot, &String)> = values[1..]
            .iter()
            .map(|v| (cache.apply_overlay(&identity(), MutationId::new(), &status(v)).unwrap(), v))
            .collect();

        let mut seed = order;
        while !failing.is_empty() {
            let idx = (seed % failing.len() as u64) as usize;
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let (snapshot, _) = failing.remove(idx);
            cache.settle_failure(&identity(), &snapshot).unwrap();

            let expected = failing.last().map_or(&values[0], |(_, v)| *v);
            let record = cache.read(&identity()).unwrap();
            prop_assert_eq!(record.get_str("status"), Some(expected.as_str()));
            prop_assert!(record.is_speculative());
        }

        prop_assert_eq!(cache.pending_mutations(&identity()), vec![survivor]);
    }
}
