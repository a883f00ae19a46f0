//! Handing stock out to users or personnel, and taking it back
use super::AssetService;
use crate::audit::AuditAction;
use crate::error::{LedgerError, Result};
use crate::identity::Identity;
use crate::ledger::{LedgerTx, StockDelta, StockLevel};
use crate::model::{
    ASSIGNMENT_HRP, Assignee, Assignment, Personnel, Role, TimeStamp, User, validate_quantity,
};
use crate::store::{self, TxResult};
use crate::utils;
use sled::Transactional;
use sled::transaction::TransactionalTree;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDraft {
    pub base_id: String,
    pub asset_id: String,
    pub assignee: Assignee,
    pub quantity: u64,
}

impl AssetService {
    /// Move `quantity` from available to assigned at the base and record who holds it.
    pub fn assign(&self, identity: &Identity, draft: AssignmentDraft) -> Result<Assignment> {
        let action = AuditAction::AssetAssigned {
            base_id: draft.base_id.clone(),
            asset_id: draft.asset_id.clone(),
            assignee: draft.assignee.clone(),
            quantity: draft.quantity,
        };
        let result = self.allocate(identity, draft);
        self.audited(identity, action, result)
    }

    /// Close an assignment, moving its quantity back to available. Returns the
    /// resulting stock at the assignment's base.
    pub fn return_assignment(&self, identity: &Identity, assignment_id: &str) -> Result<StockLevel> {
        let action = AuditAction::AssignmentReturned {
            assignment_id: assignment_id.to_string(),
        };
        let result = self.release_assignment(identity, assignment_id);
        self.audited(identity, action, result)
    }

    pub fn list_assignments(&self, identity: &Identity, base_id: &str) -> Result<Vec<Assignment>> {
        self.scope(identity)?.require(base_id)?;
        let mut assignments: Vec<Assignment> = self.store.list(&self.store.assignments)?;
        assignments.retain(|a| a.base_id == base_id);
        Ok(assignments)
    }

    fn allocate(&self, identity: &Identity, draft: AssignmentDraft) -> Result<Assignment> {
        identity.require_role(&[Role::Admin, Role::Commander], "assign assets")?;
        self.scope(identity)?.require(&draft.base_id)?;
        validate_quantity(draft.quantity)?;

        let assignment = Assignment {
            id: utils::new_id(ASSIGNMENT_HRP)?,
            base_id: draft.base_id,
            asset_id: draft.asset_id,
            assignee: draft.assignee,
            quantity: draft.quantity,
            assigned_by: identity.id.clone(),
            assigned_at: TimeStamp::new(),
        };

        let db = &self.store;
        let level = (
            &db.assignments,
            &db.ledger,
            &db.bases,
            &db.assets,
            &db.personnel,
            &db.users,
        )
            .transaction(
                |(assignments, rows, bases, assets, personnel, users)| -> TxResult<StockLevel> {
                    if bases.get(assignment.base_id.as_bytes())?.is_none() {
                        return store::abort(LedgerError::not_found(
                            "base",
                            assignment.base_id.as_str(),
                        ));
                    }
                    if assets.get(assignment.asset_id.as_bytes())?.is_none() {
                        return store::abort(LedgerError::not_found(
                            "asset",
                            assignment.asset_id.as_str(),
                        ));
                    }
                    check_assignee(personnel, users, &assignment)?;

                    let level = LedgerTx::new(rows, bases, assets).adjust(
                        &assignment.base_id,
                        &assignment.asset_id,
                        StockDelta::assign(assignment.quantity),
                    )?;
                    store::save_tx(assignments, &assignment.id, &assignment)?;
                    Ok(level)
                },
            )?;

        info!(
            assignment_id = %assignment.id,
            base_id = %assignment.base_id,
            asset_id = %assignment.asset_id,
            assignee = %assignment.assignee,
            quantity = assignment.quantity,
            available = level.available,
            assigned = level.assigned,
            "asset assigned"
        );
        Ok(assignment)
    }

    fn release_assignment(&self, identity: &Identity, assignment_id: &str) -> Result<StockLevel> {
        identity.require_role(&[Role::Admin, Role::Commander], "return assignments")?;
        let scope = self.scope(identity)?;

        let db = &self.store;
        let (assignment, level) = (&db.assignments, &db.ledger, &db.bases, &db.assets)
            .transaction(
                |(assignments, rows, bases, assets)| -> TxResult<(Assignment, StockLevel)> {
                    let assignment: Assignment =
                        store::require_tx(assignments, "assignment", assignment_id)?;
                    // out of scope reads the same as absent
                    if !scope.includes(&assignment.base_id) {
                        return store::abort(LedgerError::not_found("assignment", assignment_id));
                    }

                    let level = LedgerTx::new(rows, bases, assets).adjust(
                        &assignment.base_id,
                        &assignment.asset_id,
                        StockDelta::unassign(assignment.quantity),
                    )?;
                    store::remove_tx(assignments, assignment_id)?;
                    Ok((assignment, level))
                },
            )?;

        info!(
            assignment_id,
            base_id = %assignment.base_id,
            asset_id = %assignment.asset_id,
            quantity = assignment.quantity,
            available = level.available,
            assigned = level.assigned,
            "assignment returned"
        );
        Ok(level)
    }
}

fn check_assignee(
    personnel: &TransactionalTree,
    users: &TransactionalTree,
    assignment: &Assignment,
) -> TxResult<()> {
    let base_id = assignment.base_id.as_str();
    let problem = match &assignment.assignee {
        Assignee::Personnel(id) => match store::load_tx::<Personnel>(personnel, id)? {
            None => Some(format!("personnel {id} does not exist")),
            Some(p) if p.base_id != base_id => {
                Some(format!("personnel {id} is not stationed at {base_id}"))
            }
            Some(p) if !p.is_active => Some(format!("personnel {id} is not active")),
            Some(_) => None,
        },
        Assignee::User(id) => match store::load_tx::<User>(users, id)? {
            None => Some(format!("user {id} does not exist")),
            Some(u) if u.base_id.as_deref() != Some(base_id) => {
                Some(format!("user {id} is not stationed at {base_id}"))
            }
            Some(u) if !u.is_active => Some(format!("user {id} is not active")),
            Some(_) => None,
        },
    };
    match problem {
        Some(reason) => store::abort(LedgerError::InvalidAssignee(reason)),
        None => Ok(()),
    }
}
