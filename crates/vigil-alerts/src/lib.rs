//! Vigil Alerts
//!
//! Alert domain on top of the optimistic mutation core:
//! - [`AlertStatus`] / [`AlertSeverity`]: compile-time enumerations
//! - [`AlertSummary`]: alert entity and its cache mapping
//! - [`AlertStatusControl`]: status dropdown issuing optimistic updates

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod alert;
pub mod control;
pub mod error;
pub mod status;

// Re-exports for convenience
pub use alert::{
    alert_identity, seed_alerts, status_of, type_policies, AlertSummary, ALERT_KEY_FIELD,
    ALERT_TYPE,
};
pub use control::{status_request, AlertStatusControl, StatusOption};
pub use error::{AlertError, AlertResult};
pub use status::{AlertSeverity, AlertStatus};
