//! Vigil Console
//!
//! Wires a [`Session`] against the simulated alert API and drives the alert
//! status control end to end.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod config;
pub mod telemetry;

pub use backend::{server_status, SimulatedAlertApi};
pub use config::{BackendConfig, ConfigError, ConsoleConfig};
pub use telemetry::init_tracing;

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use vigil_alerts::{seed_alerts, AlertSeverity, AlertStatus, AlertStatusControl, AlertSummary};
use vigil_mutation::{Notification, RemoteApi, Session};

/// Parameters of one demo run
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Alert to update
    pub alert_id: String,
    /// Status to select
    pub status: AlertStatus,
}

/// What the demo observed
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    /// Status before selection
    pub initial: AlertStatus,
    /// Status shown right after selection
    pub speculative: AlertStatus,
    /// Status after settlement
    pub settled: AlertStatus,
    /// Status stored by the server
    pub server: Option<AlertStatus>,
    /// Whether the mutation succeeded
    pub success: bool,
    /// Notification emitted for the mutation
    pub notification: Option<Notification>,
}

/// Run one optimistic status update against a fresh simulated backend
///
/// # Errors
/// Setup failures (invalid alert id, unchanged status)
pub async fn run_demo(config: &ConsoleConfig, options: &DemoOptions) -> anyhow::Result<DemoReport> {
    let backend = Arc::new(SimulatedAlertApi::new(config.backend.clone()));
    let alert = AlertSummary::new(
        options.alert_id.trim(),
        "Console login without MFA",
        AlertSeverity::High,
        "AWS.Console.LoginWithoutMFA",
    );
    backend.insert(alert.clone());

    let session = Session::start(
        config.session_config(),
        Arc::clone(&backend) as Arc<dyn RemoteApi>,
    );
    seed_alerts(session.cache(), &[alert]).context("seeding alert")?;

    let mut notifications = session.coordinator().notifications();
    let control = AlertStatusControl::new(Arc::clone(session.coordinator()), &options.alert_id)
        .context("attaching status control")?;

    let initial = control.current_status();
    let handle = control
        .select(options.status)
        .with_context(|| format!("selecting {}", options.status))?;
    let speculative = control.current_status();

    let report = handle.wait().await;
    let settled = control.current_status();
    let notification = notifications.try_recv().ok();

    drop(control);
    session.shutdown().await;

    Ok(DemoReport {
        initial,
        speculative,
        settled,
        server: server_status(&backend, &options.alert_id),
        success: report.is_success(),
        notification,
    })
}
