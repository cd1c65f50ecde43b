use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;

/// One staking position held by an address, validated from the raw contract tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeEntry {
    pub raw_amount: U256,
    pub expires_at: DateTime<Utc>,
}

impl StakeEntry {
    /// Build an entry from the `(amount, expirationTimestamp)` pair returned by the contract.
    /// Expirations outside the representable calendar range are rejected.
    pub fn from_raw(amount: U256, expiration: U256) -> eyre::Result<Self> {
        let expires_at = u64::try_from(expiration)
            .ok()
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                eyre::eyre!("Expiration timestamp {} is not a valid calendar time", expiration)
            })?;

        Ok(Self {
            raw_amount: amount,
            expires_at,
        })
    }
}

/// Block range for an event scan. `to` of `None` means the latest block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: Option<u64>,
    /// Split the range into `eth_getLogs` calls of at most this many blocks.
    pub chunk_size: Option<u64>,
}

/// Where the `user` address sits in a staking event log.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    /// First indexed topic if the event has one, else the first data word.
    #[default]
    Auto,
    /// Topic at this position; topic 0 is the event signature.
    Topic(usize),
    /// 32-byte word at this position in the non-indexed data.
    DataWord(usize),
}

/// Parse an address in any hex casing into its canonical form.
pub fn normalize_address(raw: &str) -> Option<Address> {
    Address::from_str(raw.trim()).ok()
}

/// Normalize a batch of address strings, dropping the ones that do not parse.
/// Differently-cased spellings of the same account collapse to one entry.
pub fn normalize_addresses<I, S>(raw: I) -> BTreeSet<Address>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for value in raw {
        let value = value.as_ref();
        match normalize_address(value) {
            Some(address) => {
                out.insert(address);
            }
            None => {
                tracing::warn!(address = %value, "Unparseable address, skipping");
            }
        }
    }
    out
}

/// EIP-55 checksum form, as used in the report.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_entry_from_raw() {
        let entry = StakeEntry::from_raw(U256::from(5_000_000_000u64), U256::from(1_700_000_000u64))
            .unwrap();
        assert_eq!(entry.raw_amount, U256::from(5_000_000_000u64));
        assert_eq!(entry.expires_at.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_stake_entry_rejects_huge_expiration() {
        assert!(StakeEntry::from_raw(U256::from(1), U256::MAX).is_err());
        assert!(StakeEntry::from_raw(U256::from(1), U256::from(u64::MAX)).is_err());
    }

    #[test]
    fn test_normalize_collapses_casing() {
        let lower = "0x1e7866b5a5a4f09efd235d28d49568c2fe2f7ecd";
        let upper = "0x1E7866B5A5A4F09EFD235D28D49568C2FE2F7ECD";
        let set = normalize_addresses([lower, upper, "garbage"]);
        assert_eq!(set.len(), 1);

        let address = set.into_iter().next().unwrap();
        let canonical = checksum(&address);
        assert_eq!(canonical.to_lowercase(), lower);
        assert_eq!(normalize_address(&canonical), Some(address));
    }
}
