//! Persisted records, request lifecycles and their CBOR layout
use crate::error::{LedgerError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

pub const BASE_HRP: &str = "base_";
pub const ASSET_HRP: &str = "asset_";
pub const USER_HRP: &str = "user_";
pub const PERSONNEL_HRP: &str = "personnel_";
pub const PURCHASE_HRP: &str = "purchase_";
pub const TRANSFER_HRP: &str = "transfer_";
pub const ASSIGNMENT_HRP: &str = "assignment_";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> std::result::Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _: &mut C,
    ) -> std::result::Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[n(0)]
    Admin,
    #[n(1)]
    Commander,
    #[n(2)]
    Logistics,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Commander => "commander",
            Role::Logistics => "logistics",
        })
    }
}

/// A physical installation holding its own stock.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Base {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub location: Option<String>,
    // assets that have a ledger row here; maintained by the ledger on row creation
    #[n(3)]
    pub stocked_assets: Vec<String>,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub serial_number: Option<String>,
    #[n(3)]
    pub description: Option<String>,
    // bases that have a ledger row for this asset
    #[n(4)]
    pub stocked_at: Vec<String>,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

/// An account. Credentials live with the identity provider, not here.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub role: Role,
    #[n(3)]
    pub base_id: Option<String>,
    #[n(4)]
    pub is_active: bool,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Personnel {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub rank: String,
    #[n(3)]
    pub service_number: String,
    #[n(4)]
    pub base_id: String,
    #[n(5)]
    pub assigned_unit: Option<String>,
    #[n(6)]
    pub is_active: bool,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Approved => "approved",
            PurchaseStatus::Rejected => "rejected",
        })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub base_id: String,
    #[n(2)]
    pub asset_id: String,
    #[n(3)]
    pub quantity: u64,
    #[n(4)]
    pub status: PurchaseStatus,
    #[n(5)]
    pub created_by: String,
    #[n(6)]
    pub approved_by: Option<String>,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
    #[n(8)]
    pub decided_at: Option<TimeStamp<Utc>>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    #[n(0)]
    Requested,
    #[n(1)]
    Completed,
    #[n(2)]
    Rejected,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferStatus::Requested => "requested",
            TransferStatus::Completed => "completed",
            TransferStatus::Rejected => "rejected",
        })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub asset_id: String,
    #[n(2)]
    pub from_base: String,
    #[n(3)]
    pub to_base: String,
    #[n(4)]
    pub quantity: u64,
    #[n(5)]
    pub status: TransferStatus,
    #[n(6)]
    pub requested_by: String,
    #[n(7)]
    pub approved_by: Option<String>,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub decided_at: Option<TimeStamp<Utc>>,
}

/// Who holds assigned stock. Exactly one variant, never both or neither.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Assignee {
    #[n(0)]
    User(#[n(0)] String),
    #[n(1)]
    Personnel(#[n(0)] String),
}

impl Assignee {
    pub fn id(&self) -> &str {
        match self {
            Assignee::User(id) | Assignee::Personnel(id) => id,
        }
    }
}

impl fmt::Display for Assignee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignee::User(id) => write!(f, "user:{id}"),
            Assignee::Personnel(id) => write!(f, "personnel:{id}"),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub base_id: String,
    #[n(2)]
    pub asset_id: String,
    #[n(3)]
    pub assignee: Assignee,
    #[n(4)]
    pub quantity: u64,
    #[n(5)]
    pub assigned_by: String,
    #[n(6)]
    pub assigned_at: TimeStamp<Utc>,
}

/// Transfer review outcome. Accepts both the "approve" and "approved" spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl FromStr for Decision {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(LedgerError::invalid(format!(
                "decision must be approve or reject, got {other:?}"
            ))),
        }
    }
}

pub fn validate_quantity(quantity: u64) -> Result<u64> {
    if quantity == 0 {
        return Err(LedgerError::invalid("quantity must be a positive integer"));
    }
    Ok(quantity)
}

/// Parse a caller-supplied quantity. Fractions, signs and zero are refused.
pub fn parse_quantity(raw: &str) -> Result<u64> {
    let quantity = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| LedgerError::invalid(format!("quantity {raw:?} is not a positive integer")))?;
    validate_quantity(quantity)
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::invalid(format!("{field} is required")));
    }
    Ok(())
}
