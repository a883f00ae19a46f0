//! Append-only audit trail
//!
//! The service reports every successful mutation, and every failed workflow attempt,
//! to an [`AuditSink`]. Sinks are best effort: the service logs a failing sink and
//! carries on.
use crate::error::{ErrorKind, Result};
use crate::identity::Identity;
use crate::model::{Assignee, Role, TimeStamp};
use crate::store::{self, Store};
use crate::utils;
use chrono::Utc;
use sled::Tree;

/// What happened, with the details that matter for that kind of action.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum AuditAction {
    #[n(0)]
    BaseCreated {
        #[n(0)]
        base_id: String,
        #[n(1)]
        name: String,
    },
    #[n(1)]
    BaseUpdated {
        #[n(0)]
        base_id: String,
    },
    #[n(2)]
    BaseDeleted {
        #[n(0)]
        base_id: String,
    },
    #[n(3)]
    AssetCreated {
        #[n(0)]
        asset_id: String,
        #[n(1)]
        name: String,
    },
    #[n(4)]
    AssetUpdated {
        #[n(0)]
        asset_id: String,
    },
    #[n(5)]
    AssetDeleted {
        #[n(0)]
        asset_id: String,
    },
    #[n(6)]
    UserCreated {
        #[n(0)]
        user_id: String,
        #[n(1)]
        role: Role,
        #[n(2)]
        base_id: Option<String>,
    },
    #[n(7)]
    UserUpdated {
        #[n(0)]
        user_id: String,
    },
    #[n(8)]
    UserDeleted {
        #[n(0)]
        user_id: String,
    },
    #[n(9)]
    PersonnelAdded {
        #[n(0)]
        personnel_id: String,
        #[n(1)]
        base_id: String,
        #[n(2)]
        service_number: String,
    },
    #[n(10)]
    PersonnelUpdated {
        #[n(0)]
        personnel_id: String,
    },
    #[n(11)]
    PersonnelRemoved {
        #[n(0)]
        personnel_id: String,
    },
    #[n(12)]
    PurchaseRequested {
        #[n(0)]
        base_id: String,
        #[n(1)]
        asset_id: String,
        #[n(2)]
        quantity: u64,
    },
    #[n(13)]
    PurchaseDecided {
        #[n(0)]
        purchase_id: String,
        #[n(1)]
        approved: bool,
    },
    #[n(14)]
    TransferRequested {
        #[n(0)]
        asset_id: String,
        #[n(1)]
        from_base: String,
        #[n(2)]
        to_base: Option<String>,
        #[n(3)]
        quantity: u64,
    },
    #[n(15)]
    TransferReviewed {
        #[n(0)]
        transfer_id: String,
        #[n(1)]
        approved: bool,
    },
    #[n(16)]
    AssetAssigned {
        #[n(0)]
        base_id: String,
        #[n(1)]
        asset_id: String,
        #[n(2)]
        assignee: Assignee,
        #[n(3)]
        quantity: u64,
    },
    #[n(17)]
    AssignmentReturned {
        #[n(0)]
        assignment_id: String,
    },
}

impl AuditAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuditAction::BaseCreated { .. } => "create_base",
            AuditAction::BaseUpdated { .. } => "update_base",
            AuditAction::BaseDeleted { .. } => "delete_base",
            AuditAction::AssetCreated { .. } => "create_asset",
            AuditAction::AssetUpdated { .. } => "update_asset",
            AuditAction::AssetDeleted { .. } => "delete_asset",
            AuditAction::UserCreated { .. } => "create_user",
            AuditAction::UserUpdated { .. } => "update_user",
            AuditAction::UserDeleted { .. } => "delete_user",
            AuditAction::PersonnelAdded { .. } => "add_personnel",
            AuditAction::PersonnelUpdated { .. } => "update_personnel",
            AuditAction::PersonnelRemoved { .. } => "delete_personnel",
            AuditAction::PurchaseRequested { .. } => "request_purchase",
            AuditAction::PurchaseDecided { approved: true, .. } => "approve_purchase",
            AuditAction::PurchaseDecided { approved: false, .. } => "reject_purchase",
            AuditAction::TransferRequested { .. } => "request_transfer",
            AuditAction::TransferReviewed { approved: true, .. } => "approve_transfer",
            AuditAction::TransferReviewed { approved: false, .. } => "reject_transfer",
            AuditAction::AssetAssigned { .. } => "assign_asset",
            AuditAction::AssignmentReturned { .. } => "return_asset",
        }
    }

    /// The record the action touched, as `kind:id`.
    pub fn target(&self) -> String {
        match self {
            AuditAction::BaseCreated { base_id, .. }
            | AuditAction::BaseUpdated { base_id }
            | AuditAction::BaseDeleted { base_id }
            | AuditAction::PurchaseRequested { base_id, .. }
            | AuditAction::AssetAssigned { base_id, .. } => format!("base:{base_id}"),
            AuditAction::AssetCreated { asset_id, .. }
            | AuditAction::AssetUpdated { asset_id }
            | AuditAction::AssetDeleted { asset_id } => format!("asset:{asset_id}"),
            AuditAction::UserCreated { user_id, .. }
            | AuditAction::UserUpdated { user_id }
            | AuditAction::UserDeleted { user_id } => format!("user:{user_id}"),
            AuditAction::PersonnelAdded { personnel_id, .. }
            | AuditAction::PersonnelUpdated { personnel_id }
            | AuditAction::PersonnelRemoved { personnel_id } => {
                format!("personnel:{personnel_id}")
            }
            AuditAction::PurchaseDecided { purchase_id, .. } => format!("purchase:{purchase_id}"),
            AuditAction::TransferRequested { from_base, .. } => format!("base:{from_base}"),
            AuditAction::TransferReviewed { transfer_id, .. } => format!("transfer:{transfer_id}"),
            AuditAction::AssignmentReturned { assignment_id } => {
                format!("assignment:{assignment_id}")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum AuditOutcome {
    #[n(0)]
    Succeeded,
    #[n(1)]
    Failed {
        #[n(0)]
        kind: ErrorKind,
        #[n(1)]
        message: String,
    },
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct AuditEvent {
    #[n(0)]
    pub actor_id: String,
    #[n(1)]
    pub role: Role,
    #[n(2)]
    pub action: AuditAction,
    #[n(3)]
    pub target: String,
    #[n(4)]
    pub outcome: AuditOutcome,
    #[n(5)]
    pub recorded_at: TimeStamp<Utc>,
}

impl AuditEvent {
    pub fn new(actor: &Identity, action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            actor_id: actor.id.clone(),
            role: actor.role,
            target: action.target(),
            action,
            outcome,
            recorded_at: TimeStamp::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == AuditOutcome::Succeeded
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Audit events kept in the store's `audit` tree, keyed by creation time.
pub struct SledAuditLog {
    tree: Tree,
}

impl SledAuditLog {
    pub fn new(store: &Store) -> Self {
        Self {
            tree: store.audit.clone(),
        }
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Result<Vec<AuditEvent>> {
        self.tree
            .iter()
            .values()
            .map(|value| store::decode(&value?))
            .collect()
    }
}

impl AuditSink for SledAuditLog {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let bytes = minicbor::to_vec(event)?;
        self.tree.insert(utils::time_ordered_key(), bytes)?;
        Ok(())
    }
}
