use anyhow::Context;
use asset_ledger::config::AppConfig;
use asset_ledger::identity::Identity;
use asset_ledger::model::PurchaseStatus;
use asset_ledger::service::{AssetService, BaseFilter};
use asset_ledger::telemetry;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    let store = config
        .storage
        .open()
        .with_context(|| format!("failed to open store at {}", config.storage.path.display()))?;
    let service = AssetService::with_store_audit(store);

    let admin = service
        .ensure_admin(&config.bootstrap.admin_username)
        .context("failed to seed the admin account")?;
    let identity = Identity::from(&admin);

    let bases = service.list_bases(&identity, &BaseFilter::default())?;
    let assets = service.list_assets(&identity)?;
    let pending = service
        .list_purchases(&identity)?
        .into_iter()
        .filter(|p| p.status == PurchaseStatus::Pending)
        .count();
    info!(
        path = %config.storage.path.display(),
        admin = %admin.username,
        bases = bases.len(),
        assets = assets.len(),
        pending_purchases = pending,
        "asset ledger ready"
    );

    let flushed = service.store().flush()?;
    info!(bytes = flushed, "store flushed");
    Ok(())
}
