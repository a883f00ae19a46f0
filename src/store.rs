//! Persistence handle over sled
//!
//! One tree per record type plus index trees for the unique columns. Records are
//! CBOR. Multi-record effects run inside `sled::Transactional` closures; a closure
//! either commits every write it staged or none of them, and sled reruns it when it
//! races another transaction.
use crate::error::{LedgerError, Result};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, LedgerError>;

#[derive(Clone)]
pub struct Store {
    instance: Arc<Db>,
    pub(crate) bases: Tree,
    pub(crate) base_names: Tree,
    pub(crate) assets: Tree,
    pub(crate) serials: Tree,
    pub(crate) users: Tree,
    pub(crate) usernames: Tree,
    pub(crate) personnel: Tree,
    pub(crate) service_numbers: Tree,
    pub(crate) ledger: Tree,
    pub(crate) purchases: Tree,
    pub(crate) transfers: Tree,
    pub(crate) assignments: Tree,
    pub(crate) audit: Tree,
}

impl Store {
    pub fn new(instance: Arc<Db>) -> Result<Self> {
        Ok(Self {
            bases: instance.open_tree("bases")?,
            base_names: instance.open_tree("base_names")?,
            assets: instance.open_tree("assets")?,
            serials: instance.open_tree("serials")?,
            users: instance.open_tree("users")?,
            usernames: instance.open_tree("usernames")?,
            personnel: instance.open_tree("personnel")?,
            service_numbers: instance.open_tree("service_numbers")?,
            ledger: instance.open_tree("ledger")?,
            purchases: instance.open_tree("purchases")?,
            transfers: instance.open_tree("transfers")?,
            assignments: instance.open_tree("assignments")?,
            audit: instance.open_tree("audit")?,
            instance,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Arc::new(sled::open(path)?))
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.instance.flush()?)
    }

    pub(crate) fn contains(&self, tree: &Tree, key: &str) -> Result<bool> {
        Ok(tree.contains_key(key.as_bytes())?)
    }

    pub(crate) fn get<T>(&self, tree: &Tree, key: &str) -> Result<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn list<T>(&self, tree: &Tree) -> Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }

    pub(crate) fn scan<T>(&self, tree: &Tree, prefix: &str) -> Result<Vec<(String, T)>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.scan_prefix(prefix.as_bytes())
            .map(|entry| {
                let (key, value) = entry?;
                Ok((String::from_utf8_lossy(&key).into_owned(), decode(&value)?))
            })
            .collect()
    }
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

pub(crate) fn abort<T>(err: LedgerError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub(crate) fn load_tx<T>(tree: &TransactionalTree, key: &str) -> TxResult<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(key.as_bytes())? {
        Some(bytes) => match decode(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => abort(err),
        },
        None => Ok(None),
    }
}

pub(crate) fn require_tx<T>(tree: &TransactionalTree, entity: &'static str, key: &str) -> TxResult<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match load_tx(tree, key)? {
        Some(value) => Ok(value),
        None => abort(LedgerError::not_found(entity, key)),
    }
}

pub(crate) fn save_tx<T: minicbor::Encode<()>>(
    tree: &TransactionalTree,
    key: &str,
    value: &T,
) -> TxResult<()> {
    let bytes = match encode(value) {
        Ok(bytes) => bytes,
        Err(err) => return abort(err),
    };
    tree.insert(key.as_bytes(), bytes)?;
    Ok(())
}

pub(crate) fn remove_tx(tree: &TransactionalTree, key: &str) -> TxResult<()> {
    tree.remove(key.as_bytes())?;
    Ok(())
}

/// Claim `value` in a unique index for `owner`. Re-claiming your own value is a no-op.
pub(crate) fn claim_unique(
    index: &TransactionalTree,
    field: &str,
    value: &str,
    owner: &str,
) -> TxResult<()> {
    match index.get(value.as_bytes())? {
        Some(existing) if existing.as_ref() != owner.as_bytes() => abort(LedgerError::invalid(
            format!("{field} {value:?} already exists"),
        )),
        _ => {
            index.insert(value.as_bytes(), owner.as_bytes())?;
            Ok(())
        }
    }
}
