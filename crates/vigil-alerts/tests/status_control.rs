//! Alert status control against a scripted server.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use vigil_alerts::{
    alert_identity, seed_alerts, AlertError, AlertSeverity, AlertStatus, AlertStatusControl,
    AlertSummary,
};
use vigil_cache::{fields, EntityCache};
use vigil_mutation::{
    CoordinatorConfig, MutationCoordinator, MutationPhase, NotificationVariant, RemoteApi,
    RemoteError,
};
use vigil_test_utils::{Response, ScriptedRemote};

fn setup(remote: &Arc<ScriptedRemote>) -> Arc<MutationCoordinator> {
    let cache = Arc::new(EntityCache::default());
    let alert = AlertSummary::new("a1", "Root login", AlertSeverity::Critical, "AWS.Root.Login");
    seed_alerts(&cache, &[alert]).unwrap();
    Arc::new(MutationCoordinator::new(
        cache,
        Arc::clone(remote) as Arc<dyn RemoteApi>,
        CoordinatorConfig::default(),
    ))
}

#[tokio::test]
async fn current_status_is_disabled() {
    let remote = Arc::new(ScriptedRemote::new());
    let control = AlertStatusControl::new(setup(&remote), "a1").unwrap();

    let options = control.options();
    assert_eq!(
        options.iter().map(|o| o.label).collect::<Vec<_>>(),
        vec!["Open", "Triaged", "Closed", "Resolved"]
    );
    assert_eq!(
        options.iter().filter(|o| o.disabled).map(|o| o.status).collect::<Vec<_>>(),
        vec![AlertStatus::Open]
    );
    assert!(matches!(
        control.select(AlertStatus::Open),
        Err(AlertError::StatusUnchanged(AlertStatus::Open))
    ));
}

#[tokio::test]
async fn select_shows_status_immediately_then_confirms() {
    let remote = Arc::new(ScriptedRemote::new());
    let gate = remote.gate_field("status", "CLOSED", Response::Echo);
    let coordinator = setup(&remote);
    let mut notifications = coordinator.notifications();
    let mut control = AlertStatusControl::new(Arc::clone(&coordinator), "a1").unwrap();

    let handle = control.select(AlertStatus::Closed).unwrap();
    assert_eq!(handle.state(), MutationPhase::Optimistic);
    assert_eq!(control.current_status(), AlertStatus::Closed);
    assert!(control.is_pending());
    assert!(control.options().iter().any(|o| o.status == AlertStatus::Closed && o.disabled));

    gate.open();
    assert!(handle.wait().await.is_success());
    assert_eq!(control.current_status(), AlertStatus::Closed);
    assert!(!control.is_pending());

    // The control's subscription kept the record through collection.
    assert!(coordinator.cache().contains(&alert_identity("a1")));
    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.title, "Successfully updated alert");
    assert!(control.changed().await.is_ok());
}

#[tokio::test]
async fn rejected_select_reverts() {
    let remote = Arc::new(ScriptedRemote::new());
    remote.fail_next(RemoteError::rejected("insufficient permissions"));
    let coordinator = setup(&remote);
    let mut notifications = coordinator.notifications();
    let control = AlertStatusControl::new(Arc::clone(&coordinator), "a1").unwrap();

    let report = control.select(AlertStatus::Resolved).unwrap().wait().await;

    assert!(!report.is_success());
    assert_eq!(control.current_status(), AlertStatus::Open);
    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.variant, NotificationVariant::Error);
    assert_eq!(notification.title, "Failed to update alert");
    assert_eq!(notification.description, "insufficient permissions");
}

#[tokio::test]
async fn missing_status_reads_as_open() {
    let remote = Arc::new(ScriptedRemote::new());
    let coordinator = setup(&remote);
    coordinator
        .cache()
        .patch(&alert_identity("a2"), &fields([("status", "")]))
        .unwrap();

    let control = AlertStatusControl::new(coordinator, "a2").unwrap();
    assert_eq!(control.current_status(), AlertStatus::Open);
}
