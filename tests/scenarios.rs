//! End-to-end workflows through the service layer, each on its own database.
mod common;

use anyhow::Context;
use asset_ledger::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, SledAuditLog};
use asset_ledger::error::ErrorKind;
use asset_ledger::ledger::StockLevel;
use asset_ledger::model::{Assignee, Decision, PurchaseStatus, TransferStatus};
use asset_ledger::service::{AssetService, AssignmentDraft, PersonnelUpdate, TransferDraft};
use asset_ledger::store::Store;
use common::{fixture, fixture_with, personnel};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn purchase_then_transfer_between_bases() -> anyhow::Result<()> {
    let f = fixture()?;
    let alpha_cmd = f.commander(&f.alpha, "cmd_alpha")?;
    let bravo_cmd = f.commander(&f.bravo, "cmd_bravo")?;

    // a commander files the purchase, only an admin can approve it
    let purchase = f
        .service
        .request_purchase(&alpha_cmd, &f.alpha.id, &f.rifle.id, 10)
        .context("purchase request failed")?;
    assert_eq!(purchase.status, PurchaseStatus::Pending);
    assert_eq!(
        f.service.stock(&alpha_cmd, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(0, 0)
    );

    let err = f
        .service
        .decide_purchase(&alpha_cmd, &purchase.id, true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let purchase = f.service.decide_purchase(&f.admin, &purchase.id, true)?;
    assert_eq!(purchase.status, PurchaseStatus::Approved);
    assert_eq!(purchase.approved_by.as_deref(), Some(f.admin.id.as_str()));
    assert!(purchase.decided_at.is_some());
    assert_eq!(
        f.service.stock(&alpha_cmd, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(10, 0)
    );

    // bravo pulls four rifles from alpha
    let transfer = f.service.request_transfer(
        &bravo_cmd,
        TransferDraft {
            asset_id: f.rifle.id.clone(),
            from_base: f.alpha.id.clone(),
            to_base: None,
            quantity: 4,
        },
    )?;
    assert_eq!(transfer.status, TransferStatus::Requested);
    assert_eq!(transfer.to_base, f.bravo.id);

    // only the source base reviews
    let err = f
        .service
        .review_transfer(&bravo_cmd, &transfer.id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let transfer = f
        .service
        .review_transfer(&alpha_cmd, &transfer.id, Decision::Approve)?;
    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(6, 0)
    );
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::new(4, 0)
    );

    // both ends see the transfer
    assert_eq!(f.service.list_transfers(&alpha_cmd)?.len(), 1);
    assert_eq!(f.service.list_transfers(&bravo_cmd)?.len(), 1);
    Ok(())
}

#[test]
fn assign_and_return_to_personnel() -> anyhow::Result<()> {
    let f = fixture()?;
    let alpha_cmd = f.commander(&f.alpha, "cmd_alpha")?;
    let soldier = f.soldier(&f.alpha, "SN-100")?;
    f.stock_up(&f.alpha, 5)?;

    let assignment = f.service.assign(
        &alpha_cmd,
        AssignmentDraft {
            base_id: f.alpha.id.clone(),
            asset_id: f.rifle.id.clone(),
            assignee: personnel(&soldier),
            quantity: 3,
        },
    )?;
    assert_eq!(assignment.assigned_by, alpha_cmd.id);
    assert_eq!(
        f.service.stock(&alpha_cmd, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(2, 3)
    );

    let inventory = f.service.base_inventory(&alpha_cmd, &f.alpha.id)?;
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].name, "Rifle");
    assert_eq!(inventory[0].serial_number.as_deref(), Some("RF-001"));
    assert_eq!((inventory[0].available, inventory[0].assigned), (2, 3));

    assert_eq!(
        f.service.list_assignments(&alpha_cmd, &f.alpha.id)?.len(),
        1
    );

    let level = f.service.return_assignment(&alpha_cmd, &assignment.id)?;
    assert_eq!(level, StockLevel::new(5, 0));
    assert!(f.service.list_assignments(&alpha_cmd, &f.alpha.id)?.is_empty());

    // returning twice finds nothing to return
    let err = f
        .service
        .return_assignment(&alpha_cmd, &assignment.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[test]
fn assign_to_user_at_the_base() -> anyhow::Result<()> {
    let f = fixture()?;
    let officer = f.logistics(&f.alpha, "log_alpha")?;
    f.stock_up(&f.alpha, 2)?;

    f.service.assign(
        &f.admin,
        AssignmentDraft {
            base_id: f.alpha.id.clone(),
            asset_id: f.rifle.id.clone(),
            assignee: Assignee::User(officer.id.clone()),
            quantity: 2,
        },
    )?;
    assert_eq!(
        f.service.stock(&officer, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(0, 2)
    );

    // logistics officers can look but not hand out stock
    let err = f
        .service
        .assign(
            &officer,
            AssignmentDraft {
                base_id: f.alpha.id.clone(),
                asset_id: f.rifle.id.clone(),
                assignee: Assignee::User(officer.id.clone()),
                quantity: 1,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    Ok(())
}

#[test]
fn rejected_purchase_moves_nothing() -> anyhow::Result<()> {
    let f = fixture()?;
    let purchase = f
        .service
        .request_purchase(&f.admin, &f.bravo.id, &f.rifle.id, 7)?;

    let purchase = f.service.decide_purchase(&f.admin, &purchase.id, false)?;
    assert_eq!(purchase.status, PurchaseStatus::Rejected);
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::default()
    );

    // a decided purchase stays decided
    let err = f
        .service
        .decide_purchase(&f.admin, &purchase.id, true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::default()
    );
    Ok(())
}

#[test]
fn transfers_are_reviewed_once() -> anyhow::Result<()> {
    let f = fixture()?;
    f.stock_up(&f.alpha, 3)?;

    let transfer = f.service.request_transfer(
        &f.admin,
        TransferDraft {
            asset_id: f.rifle.id.clone(),
            from_base: f.alpha.id.clone(),
            to_base: Some(f.bravo.id.clone()),
            quantity: 3,
        },
    )?;
    let transfer = f
        .service
        .review_transfer(&f.admin, &transfer.id, Decision::Reject)?;
    assert_eq!(transfer.status, TransferStatus::Rejected);

    for decision in [Decision::Approve, Decision::Reject] {
        let err = f
            .service
            .review_transfer(&f.admin, &transfer.id, decision)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    }
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(3, 0)
    );
    Ok(())
}

#[test]
fn transfer_approval_checks_stock_at_review_time() -> anyhow::Result<()> {
    let f = fixture()?;
    let alpha_cmd = f.commander(&f.alpha, "cmd_alpha")?;
    let soldier = f.soldier(&f.alpha, "SN-200")?;
    f.stock_up(&f.alpha, 4)?;

    let transfer = f.service.request_transfer(
        &f.admin,
        TransferDraft {
            asset_id: f.rifle.id.clone(),
            from_base: f.alpha.id.clone(),
            to_base: Some(f.bravo.id.clone()),
            quantity: 4,
        },
    )?;

    // stock gets handed out after the request was filed
    f.service.assign(
        &alpha_cmd,
        AssignmentDraft {
            base_id: f.alpha.id.clone(),
            asset_id: f.rifle.id.clone(),
            assignee: personnel(&soldier),
            quantity: 1,
        },
    )?;

    let err = f
        .service
        .review_transfer(&alpha_cmd, &transfer.id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    // the failed approval left everything as it was
    let pending = f
        .service
        .list_transfers(&f.admin)?
        .into_iter()
        .find(|t| t.id == transfer.id)
        .context("transfer vanished")?;
    assert_eq!(pending.status, TransferStatus::Requested);
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(3, 1)
    );
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::default()
    );
    Ok(())
}

#[test]
fn assignees_must_be_active_and_stationed_at_the_base() -> anyhow::Result<()> {
    let f = fixture()?;
    let at_alpha = f.soldier(&f.alpha, "SN-300")?;
    let at_bravo = f.soldier(&f.bravo, "SN-301")?;
    f.stock_up(&f.alpha, 5)?;

    let draft = |assignee: Assignee| AssignmentDraft {
        base_id: f.alpha.id.clone(),
        asset_id: f.rifle.id.clone(),
        assignee,
        quantity: 1,
    };

    let err = f.service.assign(&f.admin, draft(personnel(&at_bravo))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAssignee);

    let err = f
        .service
        .assign(&f.admin, draft(Assignee::Personnel("personnel_missing".into())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAssignee);

    f.service.update_personnel(
        &f.admin,
        &at_alpha.id,
        PersonnelUpdate {
            is_active: Some(false),
            ..PersonnelUpdate::default()
        },
    )?;
    let err = f.service.assign(&f.admin, draft(personnel(&at_alpha))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAssignee);

    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(5, 0)
    );
    Ok(())
}

#[test]
fn zero_quantities_are_refused() -> anyhow::Result<()> {
    let f = fixture()?;
    let soldier = f.soldier(&f.alpha, "SN-400")?;
    f.stock_up(&f.alpha, 1)?;

    let err = f
        .service
        .request_purchase(&f.admin, &f.alpha.id, &f.rifle.id, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = f
        .service
        .request_transfer(
            &f.admin,
            TransferDraft {
                asset_id: f.rifle.id.clone(),
                from_base: f.alpha.id.clone(),
                to_base: Some(f.bravo.id.clone()),
                quantity: 0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = f
        .service
        .assign(
            &f.admin,
            AssignmentDraft {
                base_id: f.alpha.id.clone(),
                asset_id: f.rifle.id.clone(),
                assignee: personnel(&soldier),
                quantity: 0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    Ok(())
}

#[test]
fn workflow_attempts_land_in_the_audit_trail() -> anyhow::Result<()> {
    let f = fixture()?;
    let purchase = f
        .service
        .request_purchase(&f.admin, &f.alpha.id, &f.rifle.id, 2)?;
    f.service.decide_purchase(&f.admin, &purchase.id, true)?;
    let _ = f.service.decide_purchase(&f.admin, &purchase.id, false);

    let events = SledAuditLog::new(f.service.store()).events()?;
    let decisions: Vec<&AuditEvent> = events
        .iter()
        .filter(|e| matches!(e.action, AuditAction::PurchaseDecided { .. }))
        .collect();
    assert_eq!(decisions.len(), 2);
    assert!(decisions[0].succeeded());
    assert_eq!(decisions[0].action.name(), "approve_purchase");
    assert_eq!(decisions[1].target, format!("purchase:{}", purchase.id));
    assert!(matches!(
        decisions[1].outcome,
        AuditOutcome::Failed {
            kind: ErrorKind::AlreadyProcessed,
            ..
        }
    ));

    // record administration is in the trail too
    assert!(
        events
            .iter()
            .any(|e| matches!(&e.action, AuditAction::BaseCreated { name, .. } if name == "Alpha"))
    );
    Ok(())
}

struct BrokenSink;

impl AuditSink for BrokenSink {
    fn record(&self, _event: &AuditEvent) -> anyhow::Result<()> {
        anyhow::bail!("audit backend offline")
    }
}

#[test]
fn failing_audit_sink_does_not_fail_the_operation() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path().join("ledger.db"))?;
    let service = AssetService::new(store, Arc::new(BrokenSink));
    let f = fixture_with(dir, service)?;

    f.stock_up(&f.alpha, 6)?;
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(6, 0)
    );
    // nothing reached the store's own trail either
    assert!(SledAuditLog::new(f.service.store()).events()?.is_empty());
    Ok(())
}

#[test]
fn assigning_an_unknown_asset_is_not_found() -> anyhow::Result<()> {
    let f = fixture()?;
    let soldier = f.soldier(&f.alpha, "SN-600")?;
    f.stock_up(&f.alpha, 3)?;

    let err = f
        .service
        .assign(
            &f.admin,
            AssignmentDraft {
                base_id: f.alpha.id.clone(),
                asset_id: "asset_unknown".into(),
                assignee: personnel(&soldier),
                quantity: 1,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(3, 0)
    );
    Ok(())
}

#[test]
fn zero_quantity_is_reported_before_the_assignee() -> anyhow::Result<()> {
    let f = fixture()?;
    f.stock_up(&f.alpha, 1)?;

    let err = f
        .service
        .assign(
            &f.admin,
            AssignmentDraft {
                base_id: f.alpha.id.clone(),
                asset_id: f.rifle.id.clone(),
                assignee: Assignee::Personnel("personnel_missing".into()),
                quantity: 0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    Ok(())
}
