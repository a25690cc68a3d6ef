//! Ownership disputes and their arbitration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::{RegistryEvent, RegistryEventKind};
use super::types::Principal;
use super::Registry;
use crate::error::{FirstmarkError, Result};
use crate::fingerprint::ExactHash;

/// A challenge against a record's ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Sequential, starting at 1
    pub id: u64,
    pub accuser: Principal,
    /// Exact hash of the challenged record
    pub target: ExactHash,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<Principal>,
    /// Meaningful only once resolved
    pub upheld: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Lifecycle state derived from a [`Dispute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Open,
    Upheld,
    Rejected,
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Upheld => "upheld",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

impl Dispute {
    pub fn status(&self) -> DisputeStatus {
        match (self.resolved, self.upheld) {
            (false, _) => DisputeStatus::Open,
            (true, true) => DisputeStatus::Upheld,
            (true, false) => DisputeStatus::Rejected,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.resolved
    }
}

impl Registry {
    /// Open a dispute against a registered record and flag it as disputed.
    ///
    /// Returns the new dispute id. Any principal may raise a dispute; a
    /// record may carry several open disputes at once.
    pub fn raise_dispute(
        &self,
        accuser: &Principal,
        target: &ExactHash,
        reason: &str,
    ) -> Result<u64> {
        let (id, event) = {
            let mut state = self.write();
            if state.record(target).is_none() {
                return Err(FirstmarkError::not_found(format!("record {}", target)));
            }
            if reason.trim().is_empty() {
                return Err(FirstmarkError::EmptyReason);
            }

            let id = state.disputes.len() as u64 + 1;
            let created_at = Utc::now();
            state.disputes.push(Dispute {
                id,
                accuser: accuser.clone(),
                target: *target,
                reason: reason.to_string(),
                created_at,
                resolved: false,
                resolver: None,
                upheld: false,
                resolved_at: None,
            });
            if let Some(record) = state.record_mut(target) {
                record.disputed = true;
            }

            info!(dispute_id = id, accuser = %accuser, target = %target.short(), "Dispute raised");
            let event = RegistryEvent::new(
                RegistryEventKind::DisputeRaised { dispute_id: id },
                Some(accuser.clone()),
                Some(*target),
            );
            (id, event)
        };
        self.emit(&event);
        Ok(id)
    }

    /// Settle an open dispute. Arbitrators (and the admin) only.
    ///
    /// Upholding leaves the record flagged as disputed; ownership itself is
    /// never reassigned. Rejecting clears the flag.
    pub fn resolve_dispute(&self, dispute_id: u64, upheld: bool, actor: &Principal) -> Result<()> {
        let event = {
            let mut state = self.write();
            state.roles.require_arbitrator(actor, "resolve disputes")?;

            let index = dispute_index(dispute_id, state.disputes.len())?;
            let dispute = &mut state.disputes[index];
            if dispute.resolved {
                return Err(FirstmarkError::AlreadyResolved(dispute_id));
            }

            dispute.resolved = true;
            dispute.upheld = upheld;
            dispute.resolver = Some(actor.clone());
            dispute.resolved_at = Some(Utc::now());
            let target = dispute.target;

            if !upheld {
                if let Some(record) = state.record_mut(&target) {
                    record.disputed = false;
                }
            }

            info!(dispute_id, upheld, resolver = %actor, "Dispute resolved");
            RegistryEvent::new(
                RegistryEventKind::DisputeResolved { dispute_id, upheld },
                Some(actor.clone()),
                Some(target),
            )
        };
        self.emit(&event);
        Ok(())
    }

    pub fn get_dispute(&self, dispute_id: u64) -> Result<Dispute> {
        let state = self.read();
        let index = dispute_index(dispute_id, state.disputes.len())?;
        Ok(state.disputes[index].clone())
    }

    /// Every dispute ever raised against `target`, oldest first.
    pub fn disputes_for(&self, target: &ExactHash) -> Vec<Dispute> {
        self.read()
            .disputes
            .iter()
            .filter(|d| &d.target == target)
            .cloned()
            .collect()
    }

    /// Unresolved disputes, oldest first.
    pub fn open_disputes(&self) -> Vec<Dispute> {
        self.read()
            .disputes
            .iter()
            .filter(|d| d.is_open())
            .cloned()
            .collect()
    }

    /// All disputes in id order.
    pub fn disputes(&self) -> Vec<Dispute> {
        self.read().disputes.clone()
    }
}

fn dispute_index(dispute_id: u64, count: usize) -> Result<usize> {
    if dispute_id == 0 || dispute_id > count as u64 {
        return Err(FirstmarkError::not_found(format!("dispute {}", dispute_id)));
    }
    Ok((dispute_id - 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintTriple;

    fn p(id: &str) -> Principal {
        Principal::new(id)
    }

    fn registry_with_record() -> (Registry, ExactHash) {
        let registry = Registry::new(p("root")).unwrap();
        let fp = FingerprintTriple::exact_only(ExactHash::from_bytes(b"photo"));
        registry.register(&p("alice"), fp, "ipfs://photo").unwrap();
        (registry, ExactHash::from_bytes(b"photo"))
    }

    #[test]
    fn test_dispute_ids_are_sequential() {
        let (registry, target) = registry_with_record();
        assert_eq!(registry.raise_dispute(&p("bob"), &target, "mine").unwrap(), 1);
        assert_eq!(registry.raise_dispute(&p("carol"), &target, "also mine").unwrap(), 2);
        assert_eq!(registry.disputes_for(&target).len(), 2);
        assert_eq!(registry.stats().total_disputes, 2);
    }

    #[test]
    fn test_raise_marks_record_disputed() {
        let (registry, target) = registry_with_record();
        registry.raise_dispute(&p("bob"), &target, "stolen").unwrap();
        assert!(registry.get_record(&target).unwrap().disputed);

        let dispute = registry.get_dispute(1).unwrap();
        assert_eq!(dispute.status(), DisputeStatus::Open);
        assert_eq!(dispute.accuser, p("bob"));
        assert!(dispute.resolver.is_none());
    }

    #[test]
    fn test_raise_rejects_unknown_target_and_blank_reason() {
        let (registry, target) = registry_with_record();
        let unknown = ExactHash::from_bytes(b"nothing");
        assert!(matches!(
            registry.raise_dispute(&p("bob"), &unknown, "why"),
            Err(FirstmarkError::NotFound(_))
        ));
        assert!(matches!(
            registry.raise_dispute(&p("bob"), &target, "  \t"),
            Err(FirstmarkError::EmptyReason)
        ));
        assert!(registry.open_disputes().is_empty());
        assert!(!registry.get_record(&target).unwrap().disputed);
    }

    #[test]
    fn test_reject_clears_flag() {
        let (registry, target) = registry_with_record();
        let id = registry.raise_dispute(&p("bob"), &target, "stolen").unwrap();
        registry.resolve_dispute(id, false, &p("root")).unwrap();

        let dispute = registry.get_dispute(id).unwrap();
        assert_eq!(dispute.status(), DisputeStatus::Rejected);
        assert_eq!(dispute.resolver, Some(p("root")));
        assert!(dispute.resolved_at.is_some());
        assert!(!registry.get_record(&target).unwrap().disputed);
    }

    #[test]
    fn test_uphold_keeps_flag_and_owner() {
        let (registry, target) = registry_with_record();
        registry.add_arbitrator(&p("root"), p("dave")).unwrap();
        let id = registry.raise_dispute(&p("bob"), &target, "stolen").unwrap();
        registry.resolve_dispute(id, true, &p("dave")).unwrap();

        let record = registry.get_record(&target).unwrap();
        assert!(record.disputed);
        assert_eq!(record.owner, p("alice"));
        assert_eq!(registry.get_dispute(id).unwrap().status(), DisputeStatus::Upheld);
    }

    #[test]
    fn test_resolve_errors() {
        let (registry, target) = registry_with_record();
        let id = registry.raise_dispute(&p("bob"), &target, "stolen").unwrap();

        assert!(matches!(
            registry.resolve_dispute(id, true, &p("bob")),
            Err(FirstmarkError::Unauthorized(_))
        ));
        assert!(matches!(
            registry.resolve_dispute(0, true, &p("root")),
            Err(FirstmarkError::NotFound(_))
        ));
        assert!(matches!(
            registry.resolve_dispute(99, true, &p("root")),
            Err(FirstmarkError::NotFound(_))
        ));

        registry.resolve_dispute(id, true, &p("root")).unwrap();
        assert!(matches!(
            registry.resolve_dispute(id, false, &p("root")),
            Err(FirstmarkError::AlreadyResolved(1))
        ));
        // The failed second resolution left the outcome alone
        assert!(registry.get_dispute(id).unwrap().upheld);
    }

    #[test]
    fn test_unauthorized_checked_before_existence() {
        let (registry, _) = registry_with_record();
        assert!(matches!(
            registry.resolve_dispute(42, true, &p("mallory")),
            Err(FirstmarkError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_open_disputes_filter() {
        let (registry, target) = registry_with_record();
        let first = registry.raise_dispute(&p("bob"), &target, "one").unwrap();
        registry.raise_dispute(&p("carol"), &target, "two").unwrap();
        registry.resolve_dispute(first, false, &p("root")).unwrap();

        let open = registry.open_disputes();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, 2);
        assert_eq!(registry.disputes().len(), 2);
    }
}
