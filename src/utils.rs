//! Utility functions for record identifiers

use crate::error::{LedgerError, Result};
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique, time-ordered record id then encode using bech32
pub fn new_id(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp)
        .map_err(|err| LedgerError::StorageFailure(format!("bad id prefix {hrp:?}: {err}")))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|err| LedgerError::StorageFailure(format!("failed to encode id: {err}")))
}

// raw uuid7 bytes sort by creation time, which is what the audit tree is keyed on
pub(crate) fn time_ordered_key() -> Vec<u8> {
    uuid7().as_bytes().to_vec()
}
