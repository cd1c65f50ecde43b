use alloy::primitives::{Address, U256};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use super::fetcher::fetch_user_stakes;
use crate::chain::client::StakingClient;

/// One stake entry of one address, scaled and labelled with its chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StakingRow {
    pub address: Address,
    pub staking_amount: BigDecimal,
    pub expiration_date: DateTime<Utc>,
    pub chain: String,
    /// Sum of `staking_amount` over every row of this address on this chain.
    pub total_staked_amount: BigDecimal,
}

/// All staking rows of one chain. Empty is a valid result.
#[derive(Debug, Clone, PartialEq)]
pub struct StakingTable {
    pub chain: String,
    pub rows: Vec<StakingRow>,
}

impl StakingTable {
    pub fn empty(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of distinct addresses with at least one row.
    pub fn staker_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.address)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Convert a raw fixed-point token amount to a decimal using token decimals.
/// Exact: no floating point is involved.
pub fn scale_amount(raw: U256, decimals: u8) -> BigDecimal {
    // A U256 always renders as plain decimal digits, so this parse cannot fail
    BigDecimal::from_str(&format!("{}e-{}", raw, decimals)).unwrap_or_default()
}

/// Fetch the stakes of every address and build the chain's table.
///
/// Addresses whose fetch failed or that hold no stakes contribute no rows.
/// At most `concurrency` fetches are in flight; rows keep the address order.
pub async fn build_staking_table(
    client: &dyn StakingClient,
    chain: &str,
    addresses: &BTreeSet<Address>,
    decimals: u8,
    concurrency: usize,
) -> StakingTable {
    if addresses.is_empty() {
        return StakingTable::empty(chain);
    }

    let fetched: Vec<_> = stream::iter(addresses.iter().copied())
        .map(|address| async move { (address, fetch_user_stakes(client, chain, address).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut rows = Vec::new();
    let mut unavailable = 0usize;
    for (address, stakes) in fetched {
        let Some(stakes) = stakes else {
            unavailable += 1;
            continue;
        };
        for stake in stakes {
            rows.push(StakingRow {
                address,
                staking_amount: scale_amount(stake.raw_amount, decimals),
                expiration_date: stake.expires_at,
                chain: chain.to_string(),
                total_staked_amount: BigDecimal::default(),
            });
        }
    }

    attach_totals(&mut rows);

    if unavailable > 0 {
        tracing::warn!(
            chain = %chain,
            unavailable,
            "Some addresses could not be queried and were left out"
        );
    }

    StakingTable {
        chain: chain.to_string(),
        rows,
    }
}

/// Group rows by address and set each row's `total_staked_amount`.
fn attach_totals(rows: &mut [StakingRow]) {
    let mut totals: HashMap<Address, BigDecimal> = HashMap::new();
    for row in rows.iter() {
        *totals.entry(row.address).or_default() += &row.staking_amount;
    }
    for row in rows.iter_mut() {
        if let Some(total) = totals.get(&row.address) {
            row.total_staked_amount = total.clone();
        }
    }
}
