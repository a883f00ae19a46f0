//! Read side of the ledger
use super::AssetService;
use crate::error::{LedgerError, Result};
use crate::identity::Identity;
use crate::ledger::{self, StockLevel};
use crate::model::Asset;

/// One asset's holding at a base, joined with its catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLine {
    pub asset_id: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub available: u64,
    pub assigned: u64,
}

impl AssetService {
    /// Stock of one asset at one base. Zero when the base never held it.
    pub fn stock(&self, identity: &Identity, base_id: &str, asset_id: &str) -> Result<StockLevel> {
        self.scope(identity)?.require(base_id)?;
        if !self.store.contains(&self.store.bases, base_id)? {
            return Err(LedgerError::not_found("base", base_id));
        }
        ledger::stock(&self.store, base_id, asset_id)
    }

    /// Everything a base holds, ordered by asset name. Rows emptied to zero are left out.
    pub fn base_inventory(&self, identity: &Identity, base_id: &str) -> Result<Vec<InventoryLine>> {
        self.scope(identity)?.require(base_id)?;
        if !self.store.contains(&self.store.bases, base_id)? {
            return Err(LedgerError::not_found("base", base_id));
        }

        let mut lines = Vec::new();
        for (asset_id, level) in ledger::rows_at(&self.store, base_id)? {
            if level.is_empty() {
                continue;
            }
            let Some(asset) = self.store.get::<Asset>(&self.store.assets, &asset_id)? else {
                continue;
            };
            lines.push(InventoryLine {
                asset_id,
                name: asset.name,
                serial_number: asset.serial_number,
                available: level.available,
                assigned: level.assigned,
            });
        }
        lines.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.asset_id.cmp(&b.asset_id)));
        Ok(lines)
    }
}
