//! Purchase requests: `Pending -> Approved | Rejected`
use super::AssetService;
use crate::audit::AuditAction;
use crate::error::{LedgerError, Result};
use crate::identity::Identity;
use crate::ledger::{LedgerTx, StockDelta};
use crate::model::{
    PURCHASE_HRP, PurchaseRequest, PurchaseStatus, Role, TimeStamp, validate_quantity,
};
use crate::store::{self, TxResult};
use crate::utils;
use sled::Transactional;
use tracing::info;

impl AssetService {
    /// File a purchase for `base_id`. No stock moves until an admin approves it.
    pub fn request_purchase(
        &self,
        identity: &Identity,
        base_id: &str,
        asset_id: &str,
        quantity: u64,
    ) -> Result<PurchaseRequest> {
        let action = AuditAction::PurchaseRequested {
            base_id: base_id.to_string(),
            asset_id: asset_id.to_string(),
            quantity,
        };
        let result = self.submit_purchase(identity, base_id, asset_id, quantity);
        self.audited(identity, action, result)
    }

    /// Approve or reject a pending purchase. Approval credits the base's available
    /// stock in the same transaction that closes the request.
    pub fn decide_purchase(
        &self,
        identity: &Identity,
        purchase_id: &str,
        approve: bool,
    ) -> Result<PurchaseRequest> {
        let action = AuditAction::PurchaseDecided {
            purchase_id: purchase_id.to_string(),
            approved: approve,
        };
        let result = self.settle_purchase(identity, purchase_id, approve);
        self.audited(identity, action, result)
    }

    /// Purchases at bases the caller can see.
    pub fn list_purchases(&self, identity: &Identity) -> Result<Vec<PurchaseRequest>> {
        let scope = self.scope(identity)?;
        let mut purchases: Vec<PurchaseRequest> = self.store.list(&self.store.purchases)?;
        purchases.retain(|p| scope.includes(&p.base_id));
        Ok(purchases)
    }

    fn submit_purchase(
        &self,
        identity: &Identity,
        base_id: &str,
        asset_id: &str,
        quantity: u64,
    ) -> Result<PurchaseRequest> {
        identity.require_role(&[Role::Admin, Role::Commander], "request purchases")?;
        self.scope(identity)?.require(base_id)?;
        validate_quantity(quantity)?;

        let request = PurchaseRequest {
            id: utils::new_id(PURCHASE_HRP)?,
            base_id: base_id.to_string(),
            asset_id: asset_id.to_string(),
            quantity,
            status: PurchaseStatus::Pending,
            created_by: identity.id.clone(),
            approved_by: None,
            created_at: TimeStamp::new(),
            decided_at: None,
        };

        let db = &self.store;
        (&db.purchases, &db.bases, &db.assets).transaction(
            |(purchases, bases, assets)| -> TxResult<()> {
                if bases.get(base_id.as_bytes())?.is_none() {
                    return store::abort(LedgerError::not_found("base", base_id));
                }
                if assets.get(asset_id.as_bytes())?.is_none() {
                    return store::abort(LedgerError::not_found("asset", asset_id));
                }
                store::save_tx(purchases, &request.id, &request)
            },
        )?;

        info!(
            purchase_id = %request.id,
            base_id,
            asset_id,
            quantity,
            requested_by = %identity.id,
            "purchase requested"
        );
        Ok(request)
    }

    fn settle_purchase(
        &self,
        identity: &Identity,
        purchase_id: &str,
        approve: bool,
    ) -> Result<PurchaseRequest> {
        identity.require_role(&[Role::Admin], "decide purchases")?;
        self.scope(identity)?;

        let db = &self.store;
        let request = (&db.purchases, &db.ledger, &db.bases, &db.assets).transaction(
            |(purchases, rows, bases, assets)| -> TxResult<PurchaseRequest> {
                let mut request: PurchaseRequest =
                    store::require_tx(purchases, "purchase", purchase_id)?;
                // the status read is the gate: a concurrent decision reruns this
                // closure and lands here
                if request.status != PurchaseStatus::Pending {
                    return store::abort(LedgerError::AlreadyProcessed {
                        entity: "purchase",
                        id: purchase_id.to_string(),
                        status: request.status.to_string(),
                    });
                }

                if approve {
                    LedgerTx::new(rows, bases, assets).adjust(
                        &request.base_id,
                        &request.asset_id,
                        StockDelta::receive(request.quantity),
                    )?;
                    request.status = PurchaseStatus::Approved;
                } else {
                    request.status = PurchaseStatus::Rejected;
                }
                request.approved_by = Some(identity.id.clone());
                request.decided_at = Some(TimeStamp::new());

                store::save_tx(purchases, purchase_id, &request)?;
                Ok(request)
            },
        )?;

        info!(
            purchase_id,
            status = %request.status,
            base_id = %request.base_id,
            quantity = request.quantity,
            decided_by = %identity.id,
            "purchase decided"
        );
        Ok(request)
    }
}
