//! Shared fixtures: a throwaway sled database seeded with an admin, two bases and
//! one catalogue asset.
#![allow(dead_code)]

use asset_ledger::identity::Identity;
use asset_ledger::model::{Asset, Assignee, Base, Personnel, Role};
use asset_ledger::service::{AssetService, NewAsset, NewBase, NewPersonnel, NewUser};
use asset_ledger::store::Store;
use tempfile::{TempDir, tempdir};

pub struct Fixture {
    // keeps the database directory alive for the duration of the test
    _dir: TempDir,
    pub service: AssetService,
    pub admin: Identity,
    pub alpha: Base,
    pub bravo: Base,
    pub rifle: Asset,
}

pub fn fixture() -> anyhow::Result<Fixture> {
    let dir = tempdir()?;
    let store = Store::open(dir.path().join("ledger.db"))?;
    let service = AssetService::with_store_audit(store);
    fixture_with(dir, service)
}

/// Seed an already constructed service. `dir` must hold its database.
pub fn fixture_with(dir: TempDir, service: AssetService) -> anyhow::Result<Fixture> {
    let admin = Identity::from(&service.ensure_admin("admin")?);
    let alpha = service.add_base(
        &admin,
        NewBase {
            name: "Alpha".into(),
            location: Some("North Ridge".into()),
        },
    )?;
    let bravo = service.add_base(
        &admin,
        NewBase {
            name: "Bravo".into(),
            location: Some("South Harbour".into()),
        },
    )?;
    let rifle = service.add_asset(
        &admin,
        NewAsset {
            name: "Rifle".into(),
            serial_number: Some("RF-001".into()),
            description: None,
        },
    )?;

    Ok(Fixture {
        _dir: dir,
        service,
        admin,
        alpha,
        bravo,
        rifle,
    })
}

impl Fixture {
    pub fn commander(&self, base: &Base, username: &str) -> anyhow::Result<Identity> {
        let user = self.service.add_user(
            &self.admin,
            NewUser {
                username: username.into(),
                role: Role::Commander,
                base_id: Some(base.id.clone()),
            },
        )?;
        Ok(Identity::from(&user))
    }

    pub fn logistics(&self, base: &Base, username: &str) -> anyhow::Result<Identity> {
        let user = self.service.add_user(
            &self.admin,
            NewUser {
                username: username.into(),
                role: Role::Logistics,
                base_id: Some(base.id.clone()),
            },
        )?;
        Ok(Identity::from(&user))
    }

    pub fn soldier(&self, base: &Base, service_number: &str) -> anyhow::Result<Personnel> {
        Ok(self.service.add_personnel(
            &self.admin,
            NewPersonnel {
                name: format!("Soldier {service_number}"),
                rank: "Private".into(),
                service_number: service_number.into(),
                assigned_unit: Some("1st Platoon".into()),
                base_id: Some(base.id.clone()),
            },
        )?)
    }

    /// Put `quantity` rifles on the shelf at `base` via an approved purchase.
    pub fn stock_up(&self, base: &Base, quantity: u64) -> anyhow::Result<()> {
        let purchase =
            self.service
                .request_purchase(&self.admin, &base.id, &self.rifle.id, quantity)?;
        self.service.decide_purchase(&self.admin, &purchase.id, true)?;
        Ok(())
    }
}

pub fn personnel(person: &Personnel) -> Assignee {
    Assignee::Personnel(person.id.clone())
}
