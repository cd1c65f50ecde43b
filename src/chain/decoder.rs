use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;

use super::types::UserField;

/// Extract the `user` field from a staking event log.
///
/// Returns `None` if:
/// - The log was not emitted by the staking contract
/// - topic[0] doesn't match the configured event signature
/// - The configured topic or data word is missing
/// - A data word isn't a left-padded address
pub fn decode_staked_user(
    log: &Log,
    contract: Address,
    signature_hash: B256,
    field: UserField,
) -> Option<Address> {
    let inner = &log.inner;
    if inner.address != contract {
        return None;
    }

    let topics = inner.data.topics();
    if topics.first() != Some(&signature_hash) {
        return None;
    }

    let data = inner.data.data.as_ref();
    match field {
        UserField::Auto => match topics.get(1) {
            Some(user) => Some(Address::from_word(*user)),
            None => address_word(data, 0),
        },
        UserField::Topic(index) => topics.get(index).map(|t| Address::from_word(*t)),
        UserField::DataWord(index) => address_word(data, index),
    }
}

fn address_word(data: &[u8], index: usize) -> Option<Address> {
    let start = index.checked_mul(32)?;
    let word = data.get(start..start.checked_add(32)?)?;
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&word[12..]))
}
