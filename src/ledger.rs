//! Per-(base, asset) stock levels
//!
//! A ledger row splits a base's holding of one asset into `available` and
//! `assigned`. Rows come into existence on the first inbound movement and every
//! change goes through [`LedgerTx::adjust`], which refuses to take either column
//! below zero.
use crate::error::{LedgerError, Result};
use crate::model::{Asset, Base};
use crate::store::{self, Store, TxResult};
use sled::transaction::TransactionalTree;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    #[n(0)]
    pub available: u64,
    #[n(1)]
    pub assigned: u64,
}

impl StockLevel {
    pub fn new(available: u64, assigned: u64) -> Self {
        Self {
            available,
            assigned,
        }
    }

    pub fn total(&self) -> u64 {
        self.available + self.assigned
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0 && self.assigned == 0
    }

    /// `None` when either column would go negative or overflow.
    pub fn apply(&self, delta: StockDelta) -> Option<StockLevel> {
        Some(StockLevel {
            available: self.available.checked_add_signed(delta.available)?,
            assigned: self.assigned.checked_add_signed(delta.assigned)?,
        })
    }
}

/// Signed change to a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDelta {
    pub available: i64,
    pub assigned: i64,
}

impl StockDelta {
    /// Stock arriving at a base (approved purchase, inbound transfer).
    pub fn receive(quantity: u64) -> Self {
        Self {
            available: signed(quantity),
            assigned: 0,
        }
    }
    /// Stock leaving a base (outbound transfer).
    pub fn release(quantity: u64) -> Self {
        Self {
            available: -signed(quantity),
            assigned: 0,
        }
    }
    /// Available stock handed out to an assignee.
    pub fn assign(quantity: u64) -> Self {
        Self {
            available: -signed(quantity),
            assigned: signed(quantity),
        }
    }
    /// Assigned stock coming back.
    pub fn unassign(quantity: u64) -> Self {
        Self {
            available: signed(quantity),
            assigned: -signed(quantity),
        }
    }

    fn requested(&self) -> u64 {
        if self.available < 0 {
            self.available.unsigned_abs()
        } else {
            self.assigned.unsigned_abs()
        }
    }
}

// quantities beyond i64::MAX saturate and then fail the non-negative check
fn signed(quantity: u64) -> i64 {
    i64::try_from(quantity).unwrap_or(i64::MAX)
}

pub fn ledger_key(base_id: &str, asset_id: &str) -> String {
    format!("{base_id}/{asset_id}")
}

/// The ledger as seen from inside a transaction. Carries the base and asset trees
/// so that row creation can register the pairing on both records.
pub(crate) struct LedgerTx<'a> {
    rows: &'a TransactionalTree,
    bases: &'a TransactionalTree,
    assets: &'a TransactionalTree,
}

impl<'a> LedgerTx<'a> {
    pub(crate) fn new(
        rows: &'a TransactionalTree,
        bases: &'a TransactionalTree,
        assets: &'a TransactionalTree,
    ) -> Self {
        Self {
            rows,
            bases,
            assets,
        }
    }

    /// Apply `delta` to the (base, asset) row, creating it when absent.
    pub(crate) fn adjust(
        &self,
        base_id: &str,
        asset_id: &str,
        delta: StockDelta,
    ) -> TxResult<StockLevel> {
        let key = ledger_key(base_id, asset_id);
        let existing: Option<StockLevel> = store::load_tx(self.rows, &key)?;
        let current = existing.unwrap_or_default();

        let Some(next) = current.apply(delta) else {
            return store::abort(LedgerError::InsufficientStock {
                base_id: base_id.to_string(),
                asset_id: asset_id.to_string(),
                available: if delta.available < 0 {
                    current.available
                } else {
                    current.assigned
                },
                requested: delta.requested(),
            });
        };

        if existing.is_none() {
            self.register_row(base_id, asset_id)?;
        }
        store::save_tx(self.rows, &key, &next)?;
        Ok(next)
    }

    fn register_row(&self, base_id: &str, asset_id: &str) -> TxResult<()> {
        let mut base: Base = store::require_tx(self.bases, "base", base_id)?;
        let mut asset: Asset = store::require_tx(self.assets, "asset", asset_id)?;

        if !base.stocked_assets.iter().any(|id| id == asset_id) {
            base.stocked_assets.push(asset_id.to_string());
            store::save_tx(self.bases, base_id, &base)?;
        }
        if !asset.stocked_at.iter().any(|id| id == base_id) {
            asset.stocked_at.push(base_id.to_string());
            store::save_tx(self.assets, asset_id, &asset)?;
        }
        Ok(())
    }
}

/// Committed stock for (base, asset); zero when no row exists.
pub fn stock(store: &Store, base_id: &str, asset_id: &str) -> Result<StockLevel> {
    Ok(store
        .get(&store.ledger, &ledger_key(base_id, asset_id))?
        .unwrap_or_default())
}

/// Every ledger row at a base, keyed by asset id.
pub fn rows_at(store: &Store, base_id: &str) -> Result<Vec<(String, StockLevel)>> {
    let prefix = ledger_key(base_id, "");
    Ok(store
        .scan(&store.ledger, &prefix)?
        .into_iter()
        .map(|(key, level)| (key[prefix.len()..].to_string(), level))
        .collect())
}
