//! Service layer API for ledger workflows and record administration
use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, SledAuditLog};
use crate::error::Result;
use crate::identity::{self, Identity, Scope};
use crate::store::Store;
use std::sync::Arc;
use tracing::warn;

mod assignment;
mod catalog;
mod inventory;
mod purchase;
mod roster;
mod transfer;

pub use assignment::AssignmentDraft;
pub use catalog::{AssetUpdate, BaseFilter, NewAsset, NewBase};
pub use inventory::InventoryLine;
pub use roster::{LogisticsUpdate, NewPersonnel, NewUser, PersonnelUpdate, UserUpdate};
pub use transfer::TransferDraft;

pub struct AssetService {
    store: Store,
    audit: Arc<dyn AuditSink>,
}

impl AssetService {
    pub fn new(store: Store, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Service that writes its audit trail into the store's own audit tree.
    pub fn with_store_audit(store: Store) -> Self {
        let audit = Arc::new(SledAuditLog::new(&store));
        Self::new(store, audit)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn scope(&self, identity: &Identity) -> Result<Scope> {
        identity::resolve_scope(&self.store, identity)
    }

    /// Report `result` to the audit sink. A failing sink never changes the result.
    fn audited<T>(&self, actor: &Identity, action: AuditAction, result: Result<T>) -> Result<T> {
        let outcome = match &result {
            Ok(_) => AuditOutcome::Succeeded,
            Err(err) => AuditOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        let event = AuditEvent::new(actor, action, outcome);
        if let Err(err) = self.audit.record(&event) {
            warn!(
                actor = %event.actor_id,
                action = event.action.name(),
                error = %err,
                "audit sink failed; continuing"
            );
        }
        result
    }

    /// Audit successes only. Used by record administration, where failed attempts
    /// are not part of the trail.
    fn audited_success<T>(
        &self,
        actor: &Identity,
        result: Result<T>,
        action: impl FnOnce(&T) -> AuditAction,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                let action = action(&value);
                self.audited(actor, action, Ok(value))
            }
            Err(err) => Err(err),
        }
    }
}
