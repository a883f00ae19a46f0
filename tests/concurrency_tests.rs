//! Racing callers against one database. sled reruns conflicting transactions, so
//! every outcome below has to look as if the calls ran one after another.
mod common;

use asset_ledger::error::ErrorKind;
use asset_ledger::ledger::StockLevel;
use asset_ledger::model::{Decision, PurchaseStatus, TransferStatus};
use asset_ledger::service::{AssignmentDraft, TransferDraft};
use common::{fixture, personnel};
use std::thread;

const THREADS: usize = 8;

#[test]
fn concurrent_assignments_never_oversell() -> anyhow::Result<()> {
    let f = fixture()?;
    let soldier = f.soldier(&f.alpha, "SN-1")?;
    f.stock_up(&f.alpha, 5)?;

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    f.service.assign(
                        &f.admin,
                        AssignmentDraft {
                            base_id: f.alpha.id.clone(),
                            asset_id: f.rifle.id.clone(),
                            assignee: personnel(&soldier),
                            quantity: 1,
                        },
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("assign thread panicked"))
            .collect()
    });

    let granted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(granted, 5);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(0, 5)
    );
    assert_eq!(f.service.list_assignments(&f.admin, &f.alpha.id)?.len(), 5);
    Ok(())
}

#[test]
fn a_purchase_is_approved_exactly_once() -> anyhow::Result<()> {
    let f = fixture()?;
    let purchase = f
        .service
        .request_purchase(&f.admin, &f.bravo.id, &f.rifle.id, 9)?;

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| f.service.decide_purchase(&f.admin, &purchase.id, true)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("decide thread panicked"))
            .collect()
    });

    let approved: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].status, PurchaseStatus::Approved);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    }
    // credited once, not once per caller
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::new(9, 0)
    );
    Ok(())
}

#[test]
fn competing_transfers_drain_the_source_at_most_once() -> anyhow::Result<()> {
    let f = fixture()?;
    f.stock_up(&f.alpha, 6)?;

    // two requests that each want most of the stock
    let mut transfers = Vec::new();
    for _ in 0..2 {
        transfers.push(f.service.request_transfer(
            &f.admin,
            TransferDraft {
                asset_id: f.rifle.id.clone(),
                from_base: f.alpha.id.clone(),
                to_base: Some(f.bravo.id.clone()),
                quantity: 4,
            },
        )?);
    }

    let (service, admin) = (&f.service, &f.admin);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = transfers
            .iter()
            .map(|t| s.spawn(move || service.review_transfer(admin, &t.id, Decision::Approve)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("review thread panicked"))
            .collect()
    });

    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok(t) if t.status == TransferStatus::Completed))
        .count();
    assert_eq!(completed, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(e) if e.kind() == ErrorKind::InsufficientStock))
    );
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(2, 0)
    );
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::new(4, 0)
    );
    Ok(())
}

#[test]
fn a_transfer_is_approved_exactly_once() -> anyhow::Result<()> {
    let f = fixture()?;
    f.stock_up(&f.alpha, 6)?;
    let transfer = f.service.request_transfer(
        &f.admin,
        TransferDraft {
            asset_id: f.rifle.id.clone(),
            from_base: f.alpha.id.clone(),
            to_base: Some(f.bravo.id.clone()),
            quantity: 2,
        },
    )?;

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    f.service
                        .review_transfer(&f.admin, &transfer.id, Decision::Approve)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("review thread panicked"))
            .collect()
    });

    let completed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, TransferStatus::Completed);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    }
    // moved once, not once per caller
    assert_eq!(
        f.service.stock(&f.admin, &f.alpha.id, &f.rifle.id)?,
        StockLevel::new(4, 0)
    );
    assert_eq!(
        f.service.stock(&f.admin, &f.bravo.id, &f.rifle.id)?,
        StockLevel::new(2, 0)
    );
    Ok(())
}
