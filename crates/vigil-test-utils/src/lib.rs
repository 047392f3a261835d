//! Testing utilities for the Vigil workspace
//!
//! Shared remote API doubles and fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use vigil_cache::{fields, EntityCache, EntityIdentity, FieldMap};
use vigil_mutation::{
    CoordinatorConfig, MutationCoordinator, MutationRequest, RemoteApi, RemoteError,
};

/// How the scripted server answers one call
#[derive(Debug, Clone)]
pub enum Response {
    /// Apply the patch to the server state and return the full record
    Echo,
    /// Like `Echo`, plus extra server-side fields (timestamps, counters)
    EchoWith(FieldMap),
    /// Return exactly these fields, ignoring the patch
    Return(FieldMap),
    /// Fail the call
    Fail(RemoteError),
}

/// Releases a gated call when opened (or dropped)
#[derive(Debug)]
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

type Matcher = Box<dyn Fn(&MutationRequest) -> bool + Send + Sync>;

struct Rule {
    matcher: Matcher,
    response: Response,
    gate: Option<oneshot::Receiver<()>>,
}

/// Remote API double with a scripted, in-memory server
///
/// Calls are matched against one-shot rules in registration order; an
/// unmatched call echoes the patch.
#[derive(Default)]
pub struct ScriptedRemote {
    server: Mutex<HashMap<EntityIdentity, FieldMap>>,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<MutationRequest>>,
}

impl std::fmt::Debug for ScriptedRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRemote")
            .field("rules", &self.rules.lock().len())
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_server(&self, identity: &EntityIdentity, record: FieldMap) {
        self.server.lock().insert(identity.clone(), record);
    }

    pub fn server_state(&self, identity: &EntityIdentity) -> Option<FieldMap> {
        self.server.lock().get(identity).cloned()
    }

    /// Answer the next matching call with `response`
    pub fn respond<F>(&self, matcher: F, response: Response)
    where
        F: Fn(&MutationRequest) -> bool + Send + Sync + 'static,
    {
        self.rules.lock().push(Rule {
            matcher: Box::new(matcher),
            response,
            gate: None,
        });
    }

    /// Hold the next matching call until the returned gate opens
    pub fn respond_gated<F>(&self, matcher: F, response: Response) -> Gate
    where
        F: Fn(&MutationRequest) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.rules.lock().push(Rule {
            matcher: Box::new(matcher),
            response,
            gate: Some(rx),
        });
        Gate(tx)
    }

    /// Fail the next call, whatever it is
    pub fn fail_next(&self, error: RemoteError) {
        self.respond(|_| true, Response::Fail(error));
    }

    /// Answer the next call that patches `field` to `value`
    pub fn when_field(&self, field: &str, value: impl Into<Value>, response: Response) {
        self.respond(patches(field, value), response);
    }

    /// Gate the next call that patches `field` to `value`
    pub fn gate_field(&self, field: &str, value: impl Into<Value>, response: Response) -> Gate {
        self.respond_gated(patches(field, value), response)
    }

    pub fn calls(&self) -> Vec<MutationRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn take_rule(&self, request: &MutationRequest) -> Option<Rule> {
        let mut rules = self.rules.lock();
        let idx = rules.iter().position(|r| (r.matcher)(request))?;
        Some(rules.remove(idx))
    }

    fn echo(&self, request: &MutationRequest, extra: &FieldMap) -> FieldMap {
        let mut server = self.server.lock();
        let record = server.entry(request.target().clone()).or_default();
        for (k, v) in request.field_patch().iter().chain(extra) {
            record.insert(k.clone(), v.clone());
        }
        record.clone()
    }
}

fn patches(field: &str, value: impl Into<Value>) -> impl Fn(&MutationRequest) -> bool + Send + Sync + 'static {
    let field = field.to_string();
    let value = value.into();
    move |request| request.field_patch().get(&field) == Some(&value)
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn execute(&self, request: &MutationRequest) -> Result<FieldMap, RemoteError> {
        self.calls.lock().push(request.clone());
        let rule = self.take_rule(request);

        let response = match rule {
            Some(Rule { response, gate, .. }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                response
            }
            None => Response::Echo,
        };

        match response {
            Response::Echo => Ok(self.echo(request, &FieldMap::new())),
            Response::EchoWith(extra) => Ok(self.echo(request, &extra)),
            Response::Return(record) => Ok(record),
            Response::Fail(error) => Err(error),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn alert_identity(id: &str) -> EntityIdentity {
    EntityIdentity::new("Alert", id)
}

pub fn open_alert() -> FieldMap {
    fields([("status", "OPEN"), ("assignee", "unassigned"), ("severity", "HIGH")])
}

/// Cache holding `Alert:a1` as an open alert
pub fn seeded_cache() -> Arc<EntityCache> {
    let cache = Arc::new(EntityCache::default());
    cache
        .patch(&alert_identity("a1"), &open_alert())
        .expect("fixture identity is valid");
    cache
}

/// Coordinator over `cache` that keeps settled records around
pub fn coordinator(cache: &Arc<EntityCache>, remote: &Arc<ScriptedRemote>) -> MutationCoordinator {
    MutationCoordinator::new(
        Arc::clone(cache),
        Arc::clone(remote) as Arc<dyn RemoteApi>,
        CoordinatorConfig::default().with_collect_after_settle(false),
    )
}

