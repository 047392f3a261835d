//! Vigil Entity Cache
//!
//! Normalized, in-memory mirror of remote entities for the admin console.
//!
//! # Core Concepts
//!
//! - [`EntityIdentity`]: `(type, primary key)` cache key
//! - [`EntityCache`]: identity -> authoritative fields + at most one overlay
//! - [`OverlaySnapshot`]: pre-mutation state of the fields a mutation touched
//! - [`EntitySubscription`] / [`CollectionSubscription`]: change delivery
//!
//! # Architecture
//!
//! ```text
//!   patch ──────────────► authoritative layer ─┐
//!   apply_overlay ──────► overlay (per-field   ├─► observable record ─► subscribers
//!   settle_* ───────────►  mutation owner) ────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use vigil_cache::{fields, EntityCache, EntityIdentity, MutationId};
//!
//! let cache = EntityCache::default();
//! let alert = EntityIdentity::new("Alert", "a1");
//! cache.patch(&alert, &fields([("status", "OPEN")])).unwrap();
//!
//! let mutation = MutationId::new();
//! let snapshot = cache
//!     .apply_overlay(&alert, mutation, &fields([("status", "CLOSED")]))
//!     .unwrap();
//! assert_eq!(cache.read(&alert).unwrap().get_str("status"), Some("CLOSED"));
//!
//! cache.settle_failure(&alert, &snapshot).unwrap();
//! assert_eq!(cache.read(&alert).unwrap().get_str("status"), Some("OPEN"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod identity;
pub mod overlay;
pub mod record;
pub mod store;
pub mod subscription;

// Re-exports for convenience
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, IdentityError};
pub use identity::{EntityIdentity, TypePolicies, DEFAULT_KEY_FIELD};
pub use overlay::{MutationId, OverlaySnapshot, PriorValue};
pub use record::{fields, EntityRecord, FieldMap};
pub use store::{CacheStats, EntityCache};
pub use subscription::{CacheEvent, ChangeKind, CollectionSubscription, EntitySubscription};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
