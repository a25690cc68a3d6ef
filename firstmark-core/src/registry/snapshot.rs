//! Persistence of registry state.
//!
//! A snapshot carries only the primary data (records in registration
//! order, disputes in id order, roles and counters). Secondary indices are
//! rebuilt on load by replaying the records in order, which restores the
//! "earliest registrant first" ordering of every index list.

use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dispute::Dispute;
use super::events::TracingObserver;
use super::index::RegistryState;
use super::roles::Roles;
use super::types::{Principal, Record};
use super::Registry;
use crate::error::{FirstmarkError, Result, CURRENT_SNAPSHOT_VERSION, MAX_SNAPSHOT_SIZE};
use crate::fingerprint::PerceptualHash;

/// Serializable image of a [`Registry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub version: u8,
    pub admin: Principal,
    /// Sorted
    pub arbitrators: Vec<Principal>,
    /// Registration order
    pub records: Vec<Record>,
    /// Id order, starting at 1
    pub disputes: Vec<Dispute>,
    pub duplicates_detected: u64,
}

impl RegistrySnapshot {
    /// Serialize to CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| FirstmarkError::SerializationError(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from CBOR and check the version.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        check_size(bytes)?;
        let snapshot: Self = ciborium::from_reader(bytes)
            .map_err(|e| FirstmarkError::SerializationError(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| FirstmarkError::SerializationError(e.to_string()))
    }

    /// Deserialize from JSON and check the version.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        check_size(bytes)?;
        let snapshot: Self = serde_json::from_slice(bytes)
            .map_err(|e| FirstmarkError::SerializationError(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<()> {
        if self.version != CURRENT_SNAPSHOT_VERSION {
            return Err(FirstmarkError::UnsupportedSnapshotVersion(
                self.version,
                CURRENT_SNAPSHOT_VERSION,
            ));
        }
        Ok(())
    }

    /// Check the structural invariants a registry relies on.
    ///
    /// Record-level checks (non-zero exact hash, uniqueness, non-empty
    /// owner) are repeated while the indices are rebuilt.
    pub fn validate(&self) -> Result<()> {
        self.check_version()?;

        if self.admin.is_empty() {
            return Err(invalid("admin must not be empty"));
        }
        if self.arbitrators.iter().any(Principal::is_empty) {
            return Err(invalid("arbitrator must not be empty"));
        }

        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !seen.insert(record.exact()) {
                return Err(invalid(format!(
                    "record {} appears more than once",
                    record.exact()
                )));
            }
            if let Some(p) = &record.fingerprint.perceptual {
                PerceptualHash::from_parts(p.as_bytes().to_vec(), p.bits())
                    .map_err(|e| invalid(format!("record {}: {}", record.exact(), e)))?;
            }
        }

        for (position, dispute) in self.disputes.iter().enumerate() {
            let expected = position as u64 + 1;
            if dispute.id != expected {
                return Err(invalid(format!(
                    "dispute ids must be sequential from 1 (found {} at position {})",
                    dispute.id, expected
                )));
            }
            if !seen.contains(&dispute.target) {
                return Err(invalid(format!(
                    "dispute {} targets unknown record {}",
                    dispute.id, dispute.target
                )));
            }
            if dispute.resolved && dispute.resolver.is_none() {
                return Err(invalid(format!(
                    "resolved dispute {} has no resolver",
                    dispute.id
                )));
            }
        }

        Ok(())
    }
}

fn check_size(bytes: &[u8]) -> Result<()> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(FirstmarkError::SnapshotTooLarge {
            size: bytes.len(),
            max: MAX_SNAPSHOT_SIZE,
        });
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> FirstmarkError {
    FirstmarkError::InvalidSnapshot(reason.into())
}

impl Registry {
    /// Capture the current state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.read();
        RegistrySnapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            admin: state.roles.admin().clone(),
            arbitrators: state.roles.arbitrators().iter().cloned().collect(),
            records: state.records_in_order().cloned().collect(),
            disputes: state.disputes.clone(),
            duplicates_detected: self.duplicates_detected(),
        }
    }

    /// Rebuild a registry from a snapshot.
    ///
    /// The restored registry carries a [`TracingObserver`]; attach other
    /// observers with [`with_observer`](Self::with_observer).
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self> {
        snapshot.validate()?;

        let mut roles = Roles::new(snapshot.admin)?;
        for arbitrator in snapshot.arbitrators {
            roles.add_arbitrator(arbitrator);
        }

        let mut state = RegistryState::new(roles);
        let record_count = snapshot.records.len();
        for record in snapshot.records {
            let exact = record.exact();
            state
                .insert(record)
                .map_err(|e| invalid(format!("record {}: {}", exact, e)))?;
        }
        state.disputes = snapshot.disputes;

        debug!(
            records = record_count,
            disputes = state.disputes.len(),
            "Rebuilt registry indices"
        );
        info!(records = record_count, "Registry restored from snapshot");

        Ok(Self {
            state: RwLock::new(state),
            duplicates_detected: AtomicU64::new(snapshot.duplicates_detected),
            observers: vec![std::sync::Arc::new(TracingObserver)],
        })
    }
}
