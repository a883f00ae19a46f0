//! Bases and the asset catalogue. Admin only, apart from the read side.
use super::AssetService;
use crate::audit::AuditAction;
use crate::error::{LedgerError, Result};
use crate::identity::Identity;
use crate::ledger::{StockLevel, ledger_key};
use crate::model::{ASSET_HRP, Asset, BASE_HRP, Base, Role, TimeStamp, require_text};
use crate::store::{self, TxResult};
use crate::utils;
use sled::Transactional;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBase {
    pub name: String,
    pub location: Option<String>,
}

/// Case-insensitive substring filters; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseFilter {
    pub name: Option<String>,
    pub location: Option<String>,
}

impl BaseFilter {
    fn matches(&self, base: &Base) -> bool {
        fn contains(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }
        let name_ok = self.name.as_deref().is_none_or(|n| contains(&base.name, n));
        let location_ok = self.location.as_deref().is_none_or(|l| {
            base.location
                .as_deref()
                .is_some_and(|location| contains(location, l))
        });
        name_ok && location_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub name: String,
    pub serial_number: Option<String>,
    pub description: Option<String>,
}

/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetUpdate {
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub description: Option<String>,
}

// blank serials are treated as absent
fn normalise_serial(serial: Option<String>) -> Option<String> {
    serial
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl AssetService {
    pub fn add_base(&self, identity: &Identity, new: NewBase) -> Result<Base> {
        let result = self.create_base(identity, new);
        self.audited_success(identity, result, |base| AuditAction::BaseCreated {
            base_id: base.id.clone(),
            name: base.name.clone(),
        })
    }

    pub fn update_base(&self, identity: &Identity, base_id: &str, update: NewBase) -> Result<Base> {
        let result = self.modify_base(identity, base_id, update);
        self.audited_success(identity, result, |base| AuditAction::BaseUpdated {
            base_id: base.id.clone(),
        })
    }

    /// Refused while any ledger row at the base still holds stock.
    pub fn delete_base(&self, identity: &Identity, base_id: &str) -> Result<()> {
        let result = self.remove_base(identity, base_id);
        self.audited_success(identity, result, |_| AuditAction::BaseDeleted {
            base_id: base_id.to_string(),
        })
    }

    /// Bases visible to the caller: all of them for admins, the home base otherwise.
    pub fn list_bases(&self, identity: &Identity, filter: &BaseFilter) -> Result<Vec<Base>> {
        let scope = self.scope(identity)?;
        let mut bases: Vec<Base> = self.store.list(&self.store.bases)?;
        bases.retain(|base| scope.includes(&base.id) && filter.matches(base));
        Ok(bases)
    }

    pub fn add_asset(&self, identity: &Identity, new: NewAsset) -> Result<Asset> {
        let result = self.create_asset(identity, new);
        self.audited_success(identity, result, |asset| AuditAction::AssetCreated {
            asset_id: asset.id.clone(),
            name: asset.name.clone(),
        })
    }

    pub fn update_asset(
        &self,
        identity: &Identity,
        asset_id: &str,
        update: AssetUpdate,
    ) -> Result<Asset> {
        let result = self.modify_asset(identity, asset_id, update);
        self.audited_success(identity, result, |asset| AuditAction::AssetUpdated {
            asset_id: asset.id.clone(),
        })
    }

    /// Refused while any base holds available or assigned stock of the asset.
    pub fn delete_asset(&self, identity: &Identity, asset_id: &str) -> Result<()> {
        let result = self.remove_asset(identity, asset_id);
        self.audited_success(identity, result, |_| AuditAction::AssetDeleted {
            asset_id: asset_id.to_string(),
        })
    }

    pub fn list_assets(&self, identity: &Identity) -> Result<Vec<Asset>> {
        self.scope(identity)?;
        self.store.list(&self.store.assets)
    }

    fn create_base(&self, identity: &Identity, new: NewBase) -> Result<Base> {
        identity.require_role(&[Role::Admin], "create bases")?;
        require_text("base name", &new.name)?;

        let base = Base {
            id: utils::new_id(BASE_HRP)?,
            name: new.name.trim().to_string(),
            location: new.location,
            stocked_assets: vec![],
            created_at: TimeStamp::new(),
        };
        let db = &self.store;
        (&db.bases, &db.base_names).transaction(|(bases, names)| -> TxResult<()> {
            store::claim_unique(names, "base", &base.name, &base.id)?;
            store::save_tx(bases, &base.id, &base)
        })?;

        info!(base_id = %base.id, name = %base.name, "base created");
        Ok(base)
    }

    fn modify_base(&self, identity: &Identity, base_id: &str, update: NewBase) -> Result<Base> {
        identity.require_role(&[Role::Admin], "update bases")?;
        require_text("base name", &update.name)?;
        let name = update.name.trim();

        let db = &self.store;
        let base = (&db.bases, &db.base_names).transaction(
            |(bases, names)| -> TxResult<Base> {
                let mut base: Base = store::require_tx(bases, "base", base_id)?;
                if base.name != name {
                    store::claim_unique(names, "base", name, base_id)?;
                    store::remove_tx(names, &base.name)?;
                    base.name = name.to_string();
                }
                base.location = update.location.clone();
                store::save_tx(bases, base_id, &base)?;
                Ok(base)
            },
        )?;

        info!(base_id, name = %base.name, "base updated");
        Ok(base)
    }

    fn remove_base(&self, identity: &Identity, base_id: &str) -> Result<()> {
        identity.require_role(&[Role::Admin], "delete bases")?;

        let db = &self.store;
        (&db.bases, &db.base_names, &db.ledger, &db.assets).transaction(
            |(bases, names, rows, assets)| -> TxResult<()> {
                let base: Base = store::require_tx(bases, "base", base_id)?;
                for asset_id in &base.stocked_assets {
                    let key = ledger_key(base_id, asset_id);
                    let level: StockLevel = store::load_tx(rows, &key)?.unwrap_or_default();
                    if !level.is_empty() {
                        return store::abort(LedgerError::invalid(format!(
                            "base {base_id} still holds {} of asset {asset_id}",
                            level.total()
                        )));
                    }
                    store::remove_tx(rows, &key)?;
                    if let Some(mut asset) = store::load_tx::<Asset>(assets, asset_id)? {
                        asset.stocked_at.retain(|id| id != base_id);
                        store::save_tx(assets, asset_id, &asset)?;
                    }
                }
                store::remove_tx(names, &base.name)?;
                store::remove_tx(bases, base_id)
            },
        )?;

        info!(base_id, "base deleted");
        Ok(())
    }

    fn create_asset(&self, identity: &Identity, new: NewAsset) -> Result<Asset> {
        identity.require_role(&[Role::Admin], "create assets")?;
        require_text("asset name", &new.name)?;

        let asset = Asset {
            id: utils::new_id(ASSET_HRP)?,
            name: new.name.trim().to_string(),
            serial_number: normalise_serial(new.serial_number),
            description: new.description,
            stocked_at: vec![],
            created_at: TimeStamp::new(),
        };
        let db = &self.store;
        (&db.assets, &db.serials).transaction(|(assets, serials)| -> TxResult<()> {
            if let Some(serial) = &asset.serial_number {
                store::claim_unique(serials, "serial number", serial, &asset.id)?;
            }
            store::save_tx(assets, &asset.id, &asset)
        })?;

        info!(asset_id = %asset.id, name = %asset.name, "asset created");
        Ok(asset)
    }

    fn modify_asset(
        &self,
        identity: &Identity,
        asset_id: &str,
        update: AssetUpdate,
    ) -> Result<Asset> {
        identity.require_role(&[Role::Admin], "update assets")?;
        if let Some(name) = &update.name {
            require_text("asset name", name)?;
        }
        let serial = normalise_serial(update.serial_number);

        let db = &self.store;
        let asset = (&db.assets, &db.serials).transaction(
            |(assets, serials)| -> TxResult<Asset> {
                let mut asset: Asset = store::require_tx(assets, "asset", asset_id)?;
                if let Some(name) = &update.name {
                    asset.name = name.trim().to_string();
                }
                if let Some(serial) = &serial {
                    if asset.serial_number.as_ref() != Some(serial) {
                        store::claim_unique(serials, "serial number", serial, asset_id)?;
                        if let Some(old) = &asset.serial_number {
                            store::remove_tx(serials, old)?;
                        }
                        asset.serial_number = Some(serial.clone());
                    }
                }
                if let Some(description) = &update.description {
                    asset.description = Some(description.clone());
                }
                store::save_tx(assets, asset_id, &asset)?;
                Ok(asset)
            },
        )?;

        info!(asset_id, name = %asset.name, "asset updated");
        Ok(asset)
    }

    fn remove_asset(&self, identity: &Identity, asset_id: &str) -> Result<()> {
        identity.require_role(&[Role::Admin], "delete assets")?;

        let db = &self.store;
        (&db.assets, &db.serials, &db.ledger, &db.bases).transaction(
            |(assets, serials, rows, bases)| -> TxResult<()> {
                let asset: Asset = store::require_tx(assets, "asset", asset_id)?;
                for base_id in &asset.stocked_at {
                    let key = ledger_key(base_id, asset_id);
                    let level: StockLevel = store::load_tx(rows, &key)?.unwrap_or_default();
                    if !level.is_empty() {
                        return store::abort(LedgerError::invalid(format!(
                            "asset {asset_id} still has {} available and {} assigned at base {base_id}",
                            level.available, level.assigned
                        )));
                    }
                    store::remove_tx(rows, &key)?;
                    if let Some(mut base) = store::load_tx::<Base>(bases, base_id)? {
                        base.stocked_assets.retain(|id| id != asset_id);
                        store::save_tx(bases, base_id, &base)?;
                    }
                }
                if let Some(serial) = &asset.serial_number {
                    store::remove_tx(serials, serial)?;
                }
                store::remove_tx(assets, asset_id)
            },
        )?;

        info!(asset_id, "asset deleted");
        Ok(())
    }
}
