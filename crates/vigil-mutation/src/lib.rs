//! Vigil Mutation Coordinator
//!
//! Optimistic updates on top of [`vigil_cache`]: apply a speculative overlay
//! immediately, call the remote API, then reconcile or roll back.
//!
//! # Lifecycle
//!
//! ```text
//! submit ─► Issued ─► Optimistic ─┬─► Succeeded (authoritative merge)
//!              │                  └─► Failed    (exact rollback)
//!              └──── invalid identity ──► Failed
//! ```
//!
//! Every resolution produces one [`MutationReport`] and one [`Notification`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_cache::{fields, EntityIdentity};
//! use vigil_mutation::{MutationLabels, MutationRequest, RemoteApi, Session, SessionConfig};
//!
//! # async fn example(remote: Arc<dyn RemoteApi>) {
//! let session = Session::start(SessionConfig::default(), remote);
//! let request = MutationRequest::new(EntityIdentity::new("Alert", "a1"), fields([("status", "CLOSED")]))
//!     .with_labels(MutationLabels::for_entity("alert"));
//!
//! let report = session.coordinator().mutate(request).await;
//! println!("success: {}", report.is_success());
//! session.shutdown().await;
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod projector;
pub mod remote;
pub mod request;
pub mod session;

// Re-exports for convenience
pub use config::CoordinatorConfig;
pub use coordinator::{MutationCoordinator, MutationHandle};
pub use error::{
    extract_error_message, ErrorKind, MutationError, RemoteError, CONSISTENCY_MESSAGE,
};
pub use lifecycle::{allowed_transitions, validate_transition, MutationPhase};
pub use notification::{Notification, NotificationVariant};
pub use projector::{touched_projection, MergeProjector, Projector};
pub use remote::RemoteApi;
pub use request::{MutationLabels, MutationOutcome, MutationReport, MutationRequest};
pub use session::{Session, SessionConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
