//! Base-to-base transfers: `Requested -> Completed | Rejected`
//!
//! A commander asks for stock to be moved from another base into their own. The
//! commander of the source base, or an admin, reviews the request. Approval moves
//! the stock and closes the request in one transaction.
use super::AssetService;
use crate::audit::AuditAction;
use crate::error::{LedgerError, Result};
use crate::identity::Identity;
use crate::ledger::{LedgerTx, StockDelta};
use crate::model::{
    Decision, Role, TRANSFER_HRP, TimeStamp, TransferRequest, TransferStatus, validate_quantity,
};
use crate::store::{self, TxResult};
use crate::utils;
use sled::Transactional;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDraft {
    pub asset_id: String,
    pub from_base: String,
    /// Ignored for commanders, whose own base is always the destination.
    pub to_base: Option<String>,
    pub quantity: u64,
}

impl AssetService {
    pub fn request_transfer(
        &self,
        identity: &Identity,
        draft: TransferDraft,
    ) -> Result<TransferRequest> {
        let action = AuditAction::TransferRequested {
            asset_id: draft.asset_id.clone(),
            from_base: draft.from_base.clone(),
            to_base: draft.to_base.clone(),
            quantity: draft.quantity,
        };
        let result = self.submit_transfer(identity, draft);
        self.audited(identity, action, result)
    }

    pub fn review_transfer(
        &self,
        identity: &Identity,
        transfer_id: &str,
        decision: Decision,
    ) -> Result<TransferRequest> {
        let action = AuditAction::TransferReviewed {
            transfer_id: transfer_id.to_string(),
            approved: decision == Decision::Approve,
        };
        let result = self.settle_transfer(identity, transfer_id, decision);
        self.audited(identity, action, result)
    }

    /// Transfers with either end inside the caller's scope.
    pub fn list_transfers(&self, identity: &Identity) -> Result<Vec<TransferRequest>> {
        let scope = self.scope(identity)?;
        let mut transfers: Vec<TransferRequest> = self.store.list(&self.store.transfers)?;
        transfers.retain(|t| scope.includes(&t.from_base) || scope.includes(&t.to_base));
        Ok(transfers)
    }

    fn submit_transfer(&self, identity: &Identity, draft: TransferDraft) -> Result<TransferRequest> {
        identity.require_role(&[Role::Admin, Role::Commander], "request transfers")?;
        let scope = self.scope(identity)?;

        let to_base = match (scope.home_base(), draft.to_base) {
            (Some(own), requested) => {
                if requested.as_deref().is_some_and(|to| to != own) {
                    debug!(own, "destination overridden with the commander's base");
                }
                own.to_string()
            }
            (None, Some(to)) => to,
            (None, None) => return Err(LedgerError::invalid("to_base is required")),
        };
        validate_quantity(draft.quantity)?;
        if draft.from_base == to_base {
            return Err(LedgerError::invalid(
                "from_base and to_base must be different bases",
            ));
        }

        let request = TransferRequest {
            id: utils::new_id(TRANSFER_HRP)?,
            asset_id: draft.asset_id,
            from_base: draft.from_base,
            to_base,
            quantity: draft.quantity,
            status: TransferStatus::Requested,
            requested_by: identity.id.clone(),
            approved_by: None,
            created_at: TimeStamp::new(),
            decided_at: None,
        };

        let db = &self.store;
        (&db.transfers, &db.bases, &db.assets).transaction(
            |(transfers, bases, assets)| -> TxResult<()> {
                for base_id in [&request.from_base, &request.to_base] {
                    if bases.get(base_id.as_bytes())?.is_none() {
                        return store::abort(LedgerError::not_found("base", base_id.as_str()));
                    }
                }
                if assets.get(request.asset_id.as_bytes())?.is_none() {
                    return store::abort(LedgerError::not_found(
                        "asset",
                        request.asset_id.as_str(),
                    ));
                }
                store::save_tx(transfers, &request.id, &request)
            },
        )?;

        info!(
            transfer_id = %request.id,
            from_base = %request.from_base,
            to_base = %request.to_base,
            asset_id = %request.asset_id,
            quantity = request.quantity,
            "transfer requested"
        );
        Ok(request)
    }

    fn settle_transfer(
        &self,
        identity: &Identity,
        transfer_id: &str,
        decision: Decision,
    ) -> Result<TransferRequest> {
        identity.require_role(&[Role::Admin, Role::Commander], "review transfers")?;
        let scope = self.scope(identity)?;

        let db = &self.store;
        let request = (&db.transfers, &db.ledger, &db.bases, &db.assets).transaction(
            |(transfers, rows, bases, assets)| -> TxResult<TransferRequest> {
                let mut request: TransferRequest =
                    store::require_tx(transfers, "transfer", transfer_id)?;
                if !scope.includes(&request.from_base) {
                    return store::abort(LedgerError::forbidden(format!(
                        "only the commander of {} or an admin may review this transfer",
                        request.from_base
                    )));
                }
                if request.status != TransferStatus::Requested {
                    return store::abort(LedgerError::AlreadyProcessed {
                        entity: "transfer",
                        id: transfer_id.to_string(),
                        status: request.status.to_string(),
                    });
                }

                match decision {
                    Decision::Reject => request.status = TransferStatus::Rejected,
                    Decision::Approve => {
                        // stock may have moved since the request was filed
                        let ledger = LedgerTx::new(rows, bases, assets);
                        ledger.adjust(
                            &request.from_base,
                            &request.asset_id,
                            StockDelta::release(request.quantity),
                        )?;
                        ledger.adjust(
                            &request.to_base,
                            &request.asset_id,
                            StockDelta::receive(request.quantity),
                        )?;
                        request.status = TransferStatus::Completed;
                    }
                }
                request.approved_by = Some(identity.id.clone());
                request.decided_at = Some(TimeStamp::new());

                store::save_tx(transfers, transfer_id, &request)?;
                Ok(request)
            },
        )?;

        info!(
            transfer_id,
            status = %request.status,
            from_base = %request.from_base,
            to_base = %request.to_base,
            quantity = request.quantity,
            reviewed_by = %identity.id,
            "transfer reviewed"
        );
        Ok(request)
    }
}
