//! Admin and arbitrator roles.
//!
//! Authorization is an explicit check at the start of each mutating
//! operation; a failed check returns `Unauthorized` and leaves state
//! untouched.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::events::{RegistryEvent, RegistryEventKind};
use super::types::Principal;
use super::Registry;
use crate::error::{FirstmarkError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Roles {
    admin: Principal,
    arbitrators: BTreeSet<Principal>,
}

impl Roles {
    pub(crate) fn new(admin: Principal) -> Result<Self> {
        if admin.is_empty() {
            return Err(FirstmarkError::InvalidIdentity(
                "admin must not be empty".into(),
            ));
        }
        Ok(Self {
            admin,
            arbitrators: BTreeSet::new(),
        })
    }

    pub(crate) fn admin(&self) -> &Principal {
        &self.admin
    }

    pub(crate) fn arbitrators(&self) -> &BTreeSet<Principal> {
        &self.arbitrators
    }

    pub(crate) fn is_admin(&self, who: &Principal) -> bool {
        &self.admin == who
    }

    /// The admin is always an implicit arbitrator.
    pub(crate) fn is_arbitrator(&self, who: &Principal) -> bool {
        self.is_admin(who) || self.arbitrators.contains(who)
    }

    pub(crate) fn require_admin(&self, actor: &Principal, action: &str) -> Result<()> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            warn!(actor = %actor, action, "Rejected: admin role required");
            Err(FirstmarkError::Unauthorized(format!(
                "{} may not {}: admin role required",
                actor, action
            )))
        }
    }

    pub(crate) fn require_arbitrator(&self, actor: &Principal, action: &str) -> Result<()> {
        if self.is_arbitrator(actor) {
            Ok(())
        } else {
            warn!(actor = %actor, action, "Rejected: arbitrator role required");
            Err(FirstmarkError::Unauthorized(format!(
                "{} may not {}: arbitrator role required",
                actor, action
            )))
        }
    }

    /// Returns `true` when the set changed.
    pub(crate) fn add_arbitrator(&mut self, who: Principal) -> bool {
        self.arbitrators.insert(who)
    }

    /// Returns `true` when the set changed.
    pub(crate) fn remove_arbitrator(&mut self, who: &Principal) -> bool {
        self.arbitrators.remove(who)
    }

    pub(crate) fn set_admin(&mut self, new_admin: Principal) -> Principal {
        std::mem::replace(&mut self.admin, new_admin)
    }
}

impl Registry {
    /// Grant the arbitrator role. Admin only; granting an existing
    /// arbitrator is a no-op.
    pub fn add_arbitrator(&self, actor: &Principal, arbitrator: Principal) -> Result<()> {
        let event = {
            let mut state = self.write();
            state.roles.require_admin(actor, "add arbitrators")?;
            if arbitrator.is_empty() {
                return Err(FirstmarkError::InvalidIdentity(
                    "arbitrator must not be empty".into(),
                ));
            }
            if !state.roles.add_arbitrator(arbitrator.clone()) {
                return Ok(());
            }
            info!(actor = %actor, arbitrator = %arbitrator, "Arbitrator added");
            RegistryEvent::new(
                RegistryEventKind::ArbitratorAdded { arbitrator },
                Some(actor.clone()),
                None,
            )
        };
        self.emit(&event);
        Ok(())
    }

    /// Revoke the arbitrator role. Admin only; revoking a non-arbitrator is
    /// a no-op. The admin keeps implicit arbitrator rights regardless.
    pub fn remove_arbitrator(&self, actor: &Principal, arbitrator: &Principal) -> Result<()> {
        let event = {
            let mut state = self.write();
            state.roles.require_admin(actor, "remove arbitrators")?;
            if !state.roles.remove_arbitrator(arbitrator) {
                return Ok(());
            }
            info!(actor = %actor, arbitrator = %arbitrator, "Arbitrator removed");
            RegistryEvent::new(
                RegistryEventKind::ArbitratorRemoved {
                    arbitrator: arbitrator.clone(),
                },
                Some(actor.clone()),
                None,
            )
        };
        self.emit(&event);
        Ok(())
    }

    /// Hand the admin role to `new_admin`. Admin only.
    pub fn transfer_admin(&self, actor: &Principal, new_admin: Principal) -> Result<()> {
        let event = {
            let mut state = self.write();
            state.roles.require_admin(actor, "transfer admin")?;
            if new_admin.is_empty() {
                return Err(FirstmarkError::InvalidIdentity(
                    "new admin must not be empty".into(),
                ));
            }
            let previous = state.roles.set_admin(new_admin.clone());
            info!(previous = %previous, admin = %new_admin, "Admin transferred");
            RegistryEvent::new(
                RegistryEventKind::AdminTransferred { previous, new_admin },
                Some(actor.clone()),
                None,
            )
        };
        self.emit(&event);
        Ok(())
    }

    pub fn admin(&self) -> Principal {
        self.read().roles.admin().clone()
    }

    /// Explicitly appointed arbitrators, sorted. Does not list the admin.
    pub fn arbitrators(&self) -> Vec<Principal> {
        self.read().roles.arbitrators().iter().cloned().collect()
    }

    /// Whether `who` may resolve disputes (admin included).
    pub fn is_arbitrator(&self, who: &Principal) -> bool {
        self.read().roles.is_arbitrator(who)
    }
}
