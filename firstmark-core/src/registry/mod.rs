//! Ownership Registry.
//!
//! A first-registrant-wins store keyed by exact hash, with secondary
//! indices for the perceptual and audio tiers, owner listings, disputes,
//! and admin/arbitrator roles.
//!
//! All state lives behind one `RwLock`, so every operation is atomic and
//! two concurrent registrations of the same exact hash can never both
//! succeed. [`Registry::submit`] performs detection and registration
//! under the same write lock for callers that need "register only if
//! original" semantics.

pub mod dispute;
pub mod events;
mod index;
mod roles;
pub mod snapshot;
pub mod types;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::{FirstmarkError, Result};
use crate::fingerprint::{ExactHash, FingerprintTriple, PerceptualHash};

use index::RegistryState;
use roles::Roles;

pub use dispute::{Dispute, DisputeStatus};
pub use events::{EventLog, RegistryEvent, RegistryEventKind, RegistryObserver, TracingObserver};
pub use snapshot::RegistrySnapshot;
pub use types::{
    DetectResult, MatchKind, MatchedRecord, Principal, Record, SimilarRecord, Stats,
    SubmitOutcome,
};

/// Thread-safe ownership registry.
pub struct Registry {
    state: RwLock<RegistryState>,
    duplicates_detected: AtomicU64,
    observers: Vec<Arc<dyn RegistryObserver>>,
}

impl Registry {
    /// Create an empty registry administered by `admin`.
    ///
    /// Events are forwarded to `tracing` by default.
    pub fn new(admin: Principal) -> Result<Self> {
        let roles = Roles::new(admin)?;
        info!(admin = %roles.admin(), "Registry created");
        Ok(Self {
            state: RwLock::new(RegistryState::new(roles)),
            duplicates_detected: AtomicU64::new(0),
            observers: vec![Arc::new(TracingObserver)],
        })
    }

    /// Attach an additional observer.
    pub fn with_observer(mut self, observer: Arc<dyn RegistryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Classify a fingerprint against everything registered so far.
    ///
    /// Tiers are consulted in priority order (exact, perceptual, audio); the
    /// earliest registrant of the first matching tier is reported. Any
    /// non-`Original` result bumps the duplicate counter.
    pub fn detect(&self, fingerprint: &FingerprintTriple) -> DetectResult {
        let result = self.read().detect(fingerprint);
        if result.is_match() {
            self.record_duplicate(&result);
        }
        result
    }

    /// Bind `fingerprint` to `owner`.
    ///
    /// Fails with `AlreadyRegistered` when the exact hash is taken. A
    /// perceptual or audio collision with an existing record is not an
    /// error here; use [`submit`](Self::submit) to refuse those.
    pub fn register(
        &self,
        owner: &Principal,
        fingerprint: FingerprintTriple,
        locator: &str,
    ) -> Result<Record> {
        let record = {
            let mut state = self.write();
            Self::insert_locked(&mut state, owner, fingerprint, locator)?
        };
        self.emit_registered(&record);
        Ok(record)
    }

    /// Detect and, when the content is original, register it, all under
    /// one write lock.
    pub fn submit(
        &self,
        owner: &Principal,
        fingerprint: FingerprintTriple,
        locator: &str,
    ) -> Result<SubmitOutcome> {
        let outcome = {
            let mut state = self.write();
            let result = state.detect(&fingerprint);
            if result.is_match() {
                SubmitOutcome::Duplicate(result)
            } else {
                let record = Self::insert_locked(&mut state, owner, fingerprint, locator)?;
                SubmitOutcome::Registered(record)
            }
        };

        match &outcome {
            SubmitOutcome::Duplicate(result) => self.record_duplicate(result),
            SubmitOutcome::Registered(record) => self.emit_registered(record),
        }
        Ok(outcome)
    }

    fn insert_locked(
        state: &mut RegistryState,
        owner: &Principal,
        fingerprint: FingerprintTriple,
        locator: &str,
    ) -> Result<Record> {
        state.check_insertable(owner, &fingerprint)?;
        let record = Record {
            owner: owner.clone(),
            fingerprint,
            locator: locator.to_string(),
            created_at: state.next_timestamp(),
            disputed: false,
            view_count: 0,
        };
        state.insert(record.clone())?;
        info!(
            owner = %owner,
            exact = %record.exact().short(),
            total = state.len(),
            "Registered"
        );
        Ok(record)
    }

    pub fn get_record(&self, exact: &ExactHash) -> Result<Record> {
        self.read()
            .record(exact)
            .cloned()
            .ok_or_else(|| FirstmarkError::not_found(format!("record {}", exact)))
    }

    /// Every record `owner` registered, in registration order.
    pub fn records_by_owner(&self, owner: &Principal) -> Vec<Record> {
        self.read().records_by_owner(owner)
    }

    /// All records in registration order.
    pub fn records(&self) -> Vec<Record> {
        self.read().records_in_order().cloned().collect()
    }

    pub fn exists(&self, exact: &ExactHash) -> bool {
        self.read().record(exact).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Stats {
        let state = self.read();
        Stats {
            total_registered: state.len() as u64,
            total_duplicates_detected: self.duplicates_detected(),
            total_disputes: state.disputes.len() as u64,
        }
    }

    /// Bump the view counter of a record and return the new count.
    pub fn increment_views(&self, exact: &ExactHash) -> Result<u64> {
        let mut state = self.write();
        let record = state
            .record_mut(exact)
            .ok_or_else(|| FirstmarkError::not_found(format!("record {}", exact)))?;
        record.view_count = record.view_count.saturating_add(1);
        debug!(exact = %exact.short(), views = record.view_count, "View recorded");
        Ok(record.view_count)
    }

    /// Records whose perceptual hash lies within `max_distance` of `query`,
    /// closest first, ties broken by registration order.
    ///
    /// Records with a perceptual hash of a different length are skipped.
    /// This is a read-only query and does not count as a detection.
    pub fn find_similar(
        &self,
        query: &PerceptualHash,
        max_distance: u32,
        limit: usize,
    ) -> Vec<SimilarRecord> {
        self.read().similar(query, max_distance, limit)
    }

    pub(crate) fn duplicates_detected(&self) -> u64 {
        self.duplicates_detected.load(Ordering::Relaxed)
    }

    fn record_duplicate(&self, result: &DetectResult) {
        let total = self.duplicates_detected.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(kind = %result.kind, total, "Duplicate detected");
        let event = RegistryEvent::new(
            RegistryEventKind::DuplicateDetected { kind: result.kind },
            None,
            result.matched.as_ref().map(|m| m.matched_hash),
        );
        self.emit(&event);
    }

    fn emit_registered(&self, record: &Record) {
        let event = RegistryEvent::new(
            RegistryEventKind::Registered,
            Some(record.owner.clone()),
            Some(record.exact()),
        );
        self.emit(&event);
    }

    /// Notify observers. Must be called without holding the state lock.
    pub(crate) fn emit(&self, event: &RegistryEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    /// A panic in another thread can not leave the state half-written:
    /// every mutation validates before it touches anything.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Registry")
            .field("records", &state.len())
            .field("disputes", &state.disputes.len())
            .field("duplicates_detected", &self.duplicates_detected())
            .field("observers", &self.observers.len())
            .finish()
    }
}
