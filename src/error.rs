//! Error taxonomy shared by every ledger and workflow operation
use sled::transaction::TransactionError;
use std::convert::Infallible;
use std::fmt;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Stable, machine-readable error code. The message on [`LedgerError`] may change,
/// the kind does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ErrorKind {
    #[n(0)]
    NotFound,
    #[n(1)]
    Forbidden,
    #[n(2)]
    InvalidInput,
    #[n(3)]
    InvalidAssignee,
    #[n(4)]
    AlreadyProcessed,
    #[n(5)]
    InsufficientStock,
    #[n(6)]
    StorageFailure,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid assignee: {0}")]
    InvalidAssignee(String),
    #[error("{entity} {id} already processed (status: {status})")]
    AlreadyProcessed {
        entity: &'static str,
        id: String,
        status: String,
    },
    #[error(
        "insufficient stock of asset {asset_id} at base {base_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        base_id: String,
        asset_id: String,
        available: u64,
        requested: u64,
    },
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Forbidden(_) => ErrorKind::Forbidden,
            LedgerError::InvalidInput(_) => ErrorKind::InvalidInput,
            LedgerError::InvalidAssignee(_) => ErrorKind::InvalidAssignee,
            LedgerError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            LedgerError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            LedgerError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        LedgerError::Forbidden(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        LedgerError::InvalidInput(msg.into())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidAssignee => "invalid_assignee",
            ErrorKind::AlreadyProcessed => "already_processed",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::StorageFailure => "storage_failure",
        };
        f.write_str(code)
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::StorageFailure(err.to_string())
    }
}

impl From<minicbor::decode::Error> for LedgerError {
    fn from(err: minicbor::decode::Error) -> Self {
        LedgerError::StorageFailure(format!("corrupt record: {err}"))
    }
}

impl From<minicbor::encode::Error<Infallible>> for LedgerError {
    fn from(err: minicbor::encode::Error<Infallible>) -> Self {
        LedgerError::StorageFailure(format!("failed to encode record: {err}"))
    }
}

// Aborts carry the workflow error through unchanged; anything sled reports is storage.
impl From<TransactionError<LedgerError>> for LedgerError {
    fn from(err: TransactionError<LedgerError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(storage) => storage.into(),
        }
    }
}
