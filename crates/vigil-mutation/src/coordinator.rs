//! Optimistic mutation coordinator
//!
//! Drives one mutation through its lifecycle:
//! - Resolve and validate the target identity
//! - Project and lay the speculative overlay (synchronously)
//! - Call the remote API on a spawned task
//! - Reconcile with the authoritative fields, or roll back
//! - Emit exactly one notification and one report

use crate::config::CoordinatorConfig;
use crate::error::{extract_error_message, ErrorKind, MutationError, RemoteError};
use crate::lifecycle::{validate_transition, MutationPhase};
use crate::notification::Notification;
use crate::projector::{touched_projection, MergeProjector, Projector};
use crate::remote::RemoteApi;
use crate::request::{MutationOutcome, MutationReport, MutationRequest};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use vigil_cache::{CacheError, EntityCache, EntityIdentity, FieldMap, MutationId, OverlaySnapshot};

/// Handle to one submitted mutation
///
/// Dropping the handle does not cancel the mutation.
#[derive(Debug)]
pub struct MutationHandle {
    id: MutationId,
    target: EntityIdentity,
    phase: watch::Receiver<MutationPhase>,
    report: oneshot::Receiver<MutationReport>,
}

impl MutationHandle {
    /// Mutation identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// Target as issued
    #[inline]
    #[must_use]
    pub fn target(&self) -> &EntityIdentity {
        &self.target
    }

    /// Current lifecycle phase
    #[inline]
    #[must_use]
    pub fn state(&self) -> MutationPhase {
        *self.phase.borrow()
    }

    /// Wait for the mutation to resolve
    pub async fn wait(self) -> MutationReport {
        match self.report.await {
            Ok(report) => report,
            Err(_) => {
                let err = MutationError::SettlementAborted("settlement task dropped".to_string());
                tracing::error!(id = %self.id, error = %err, "mutation resolved without report");
                MutationReport {
                    id: self.id,
                    target: self.target,
                    outcome: MutationOutcome::Failure {
                        reason: err.kind(),
                        message: err.user_message(),
                    },
                }
            }
        }
    }
}

/// State shared between the coordinator and its settlement tasks
#[derive(Debug)]
struct Shared {
    cache: Arc<EntityCache>,
    remote: Arc<dyn RemoteApi>,
    config: CoordinatorConfig,
    notifications: broadcast::Sender<Notification>,
    in_flight: DashMap<MutationId, EntityIdentity>,
}

/// Optimistic mutation coordinator
#[derive(Debug)]
pub struct MutationCoordinator {
    shared: Arc<Shared>,
    projector: Arc<dyn Projector>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MutationCoordinator {
    /// Create coordinator with the merge projector
    #[must_use]
    pub fn new(cache: Arc<EntityCache>, remote: Arc<dyn RemoteApi>, config: CoordinatorConfig) -> Self {
        Self::with_projector(cache, remote, Arc::new(MergeProjector::new()), config)
    }

    /// Create coordinator with a custom projector
    #[must_use]
    pub fn with_projector(
        cache: Arc<EntityCache>,
        remote: Arc<dyn RemoteApi>,
        projector: Arc<dyn Projector>,
        config: CoordinatorConfig,
    ) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                cache,
                remote,
                config,
                notifications,
                in_flight: DashMap::new(),
            }),
            projector,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Cache this coordinator writes to
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.shared.cache
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Subscribe to notifications
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.shared.notifications.subscribe()
    }

    /// Number of mutations awaiting the server
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.len()
    }

    /// Check if a mutation is awaiting the server
    #[must_use]
    pub fn is_in_flight(&self, id: MutationId) -> bool {
        self.shared.in_flight.contains_key(&id)
    }

    /// Submit a mutation
    ///
    /// The speculative overlay is visible in the cache when this returns. The
    /// remote call and settlement run on a spawned task. Invalid identities
    /// resolve immediately without touching the cache or the network.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: MutationRequest) -> MutationHandle {
        let id = MutationId::new();
        let span = tracing::info_span!("mutation", %id, entity = %request.target());
        let _guard = span.enter();

        let (phase_tx, phase_rx) = watch::channel(MutationPhase::Issued);
        let (report_tx, report_rx) = oneshot::channel();
        let handle = MutationHandle {
            id,
            target: request.target().clone(),
            phase: phase_rx,
            report: report_rx,
        };

        let (identity, snapshot) = match self.begin(id, &request) {
            Ok(started) => started,
            Err(err) => {
                tracing::warn!(error = %err, "mutation rejected before dispatch");
                let outcome = MutationOutcome::Failure {
                    reason: err.kind(),
                    message: err.user_message(),
                };
                self.shared.finish(id, request, outcome, &phase_tx, report_tx);
                return handle;
            }
        };

        if let Err(err) = advance(&phase_tx, MutationPhase::Optimistic) {
            tracing::error!(error = %err, "lifecycle violation");
        }
        self.shared.in_flight.insert(id, identity.clone());

        let settlement = Settlement {
            id,
            identity,
            request,
            snapshot,
            phase: phase_tx,
            report: report_tx,
        };
        let task = tokio::spawn(
            Arc::clone(&self.shared)
                .settle(settlement)
                .instrument(span.clone()),
        );

        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);

        handle
    }

    /// Submit a mutation and wait for its resolution
    pub async fn mutate(&self, request: MutationRequest) -> MutationReport {
        self.submit(request).wait().await
    }

    /// Wait for every submitted mutation to settle
    pub async fn drain(&self) {
        loop {
            let pending = std::mem::take(&mut *self.tasks.lock());
            if pending.is_empty() {
                break;
            }
            for result in futures::future::join_all(pending).await {
                if let Err(err) = result {
                    tracing::error!(error = %err, "settlement task failed");
                }
            }
        }
    }

    /// Normalize, project and lay the overlay
    ///
    /// Projection runs under the record's entry lock, against the fields
    /// the overlay is laid on.
    fn begin(
        &self,
        id: MutationId,
        request: &MutationRequest,
    ) -> Result<(EntityIdentity, OverlaySnapshot), MutationError> {
        let cache = &self.shared.cache;
        let identity = cache.identify(request.target()).map_err(CacheError::from)?;

        let snapshot = cache.apply_projected_overlay(&identity, id, |current| {
            touched_projection(&self.projector.project(current, request), request)
        })?;
        tracing::debug!(
            %identity,
            projector = self.projector.name(),
            fields = snapshot.previous().len(),
            "optimistic overlay applied"
        );
        Ok((identity, snapshot))
    }
}

/// Everything a settlement task owns
struct Settlement {
    id: MutationId,
    identity: EntityIdentity,
    request: MutationRequest,
    snapshot: OverlaySnapshot,
    phase: watch::Sender<MutationPhase>,
    report: oneshot::Sender<MutationReport>,
}

impl Shared {
    async fn settle(self: Arc<Self>, settlement: Settlement) {
        let Settlement {
            id,
            identity,
            request,
            snapshot,
            phase,
            report,
        } = settlement;

        let outcome = match self.call_remote(&request).await {
            Ok(authoritative) => self.reconcile(id, &identity, &snapshot, authoritative),
            Err(err) => self.roll_back(&identity, &snapshot, &err),
        };

        self.in_flight.remove(&id);
        if self.config.collect_after_settle {
            let evicted = self.cache.collect_unused();
            if evicted > 0 {
                tracing::debug!(evicted, "collected unused records");
            }
        }

        self.finish(id, request, outcome, &phase, report);
    }

    async fn call_remote(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError> {
        match self.config.remote_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, self.remote.execute(request))
                .await
                .unwrap_or_else(|_| {
                    Err(RemoteError::Timeout {
                        after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    })
                }),
            None => self.remote.execute(request).await,
        }
    }

    fn reconcile(
        &self,
        id: MutationId,
        identity: &EntityIdentity,
        snapshot: &OverlaySnapshot,
        authoritative: FieldMap,
    ) -> MutationOutcome {
        match self.cache.settle_success(identity, id, &authoritative) {
            Ok(record) => {
                tracing::info!(
                    fields = authoritative.len(),
                    speculative = record.is_speculative(),
                    "mutation reconciled"
                );
                MutationOutcome::Success {
                    authoritative_fields: authoritative,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "cache consistency violation on reconcile");
                // Do not leave this mutation's overlay behind.
                if let Err(revert_err) = self.cache.settle_failure(identity, snapshot) {
                    tracing::error!(error = %revert_err, "overlay revert failed");
                }
                let err = MutationError::from(err);
                MutationOutcome::Failure {
                    reason: ErrorKind::CacheConsistency,
                    message: err.user_message(),
                }
            }
        }
    }

    fn roll_back(
        &self,
        identity: &EntityIdentity,
        snapshot: &OverlaySnapshot,
        err: &RemoteError,
    ) -> MutationOutcome {
        tracing::warn!(error = %err, "remote mutation failed, rolling back");
        match self.cache.settle_failure(identity, snapshot) {
            Ok(Some(record)) => {
                tracing::debug!(speculative = record.is_speculative(), "overlay reverted");
            }
            Ok(None) => tracing::debug!("no record left to revert"),
            Err(cache_err) => {
                tracing::error!(error = %cache_err, "cache consistency violation on rollback");
            }
        }
        MutationOutcome::Failure {
            reason: ErrorKind::RemoteMutation,
            message: extract_error_message(err),
        }
    }

    /// Resolve: phase, notification, report
    fn finish(
        &self,
        id: MutationId,
        request: MutationRequest,
        outcome: MutationOutcome,
        phase: &watch::Sender<MutationPhase>,
        report: oneshot::Sender<MutationReport>,
    ) {
        let to = if outcome.is_success() {
            MutationPhase::Succeeded
        } else {
            MutationPhase::Failed
        };
        if let Err(err) = advance(phase, to) {
            tracing::error!(error = %err, "lifecycle violation");
        }

        let notification = Notification::for_outcome(id, request.labels(), &outcome);
        // No receivers is fine; nobody is watching notifications.
        let _ = self.notifications.send(notification);

        let _ = report.send(MutationReport {
            id,
            target: request.target().clone(),
            outcome,
        });
    }
}

fn advance(phase: &watch::Sender<MutationPhase>, to: MutationPhase) -> Result<(), MutationError> {
    let from = *phase.borrow();
    validate_transition(from, to)?;
    phase.send_replace(to);
    tracing::debug!(?from, ?to, "mutation transition");
    Ok(())
}
