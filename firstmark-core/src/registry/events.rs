//! Registry events and observers.
//!
//! Observers are invoked after the registry lock has been released, in
//! the order the events were produced by each call.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::{MatchKind, Principal};
use crate::fingerprint::ExactHash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEventKind {
    Registered,
    DuplicateDetected { kind: MatchKind },
    DisputeRaised { dispute_id: u64 },
    DisputeResolved { dispute_id: u64, upheld: bool },
    AdminTransferred { previous: Principal, new_admin: Principal },
    ArbitratorAdded { arbitrator: Principal },
    ArbitratorRemoved { arbitrator: Principal },
}

/// A state change (or detection) observed on a [`Registry`](super::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    #[serde(flatten)]
    pub kind: RegistryEventKind,
    /// Principal that caused the event, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Principal>,
    pub timestamp: DateTime<Utc>,
    /// Exact hash of the record the event concerns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<ExactHash>,
}

impl RegistryEvent {
    pub(crate) fn new(
        kind: RegistryEventKind,
        actor: Option<Principal>,
        exact: Option<ExactHash>,
    ) -> Self {
        Self {
            kind,
            actor,
            timestamp: Utc::now(),
            exact,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            RegistryEventKind::Registered => "registered",
            RegistryEventKind::DuplicateDetected { .. } => "duplicate_detected",
            RegistryEventKind::DisputeRaised { .. } => "dispute_raised",
            RegistryEventKind::DisputeResolved { .. } => "dispute_resolved",
            RegistryEventKind::AdminTransferred { .. } => "admin_transferred",
            RegistryEventKind::ArbitratorAdded { .. } => "arbitrator_added",
            RegistryEventKind::ArbitratorRemoved { .. } => "arbitrator_removed",
        }
    }
}

/// Receives every event a registry emits.
///
/// Implementations must not call back into the registry that notified them
/// with a blocking write expectation; they run on the caller's thread.
pub trait RegistryObserver: Send + Sync {
    fn on_event(&self, event: &RegistryEvent);
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RegistryObserver for TracingObserver {
    fn on_event(&self, event: &RegistryEvent) {
        let actor = event.actor.as_ref().map(Principal::as_str).unwrap_or("-");
        let exact = event.exact.map(|e| e.short()).unwrap_or_else(|| "-".into());
        info!(
            target: "firstmark::events",
            event = event.name(),
            actor,
            exact = %exact,
            "Registry event"
        );
    }
}

/// In-memory event sink, handy for audit trails and tests.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<RegistryEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<RegistryEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RegistryEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RegistryObserver for EventLog {
    fn on_event(&self, event: &RegistryEvent) {
        self.lock().push(event.clone());
    }
}
