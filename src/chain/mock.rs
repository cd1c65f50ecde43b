use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::client::StakingClient;
use super::types::{BlockRange, StakeEntry};

/// In-memory [`StakingClient`] for tests.
#[derive(Default)]
pub struct MockStakingClient {
    stakes: HashMap<Address, Vec<StakeEntry>>,
    failing: HashSet<Address>,
    users: Vec<Address>,
    fail_scan: bool,
    stake_calls: AtomicUsize,
}

impl MockStakingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stakes(mut self, user: Address, entries: Vec<StakeEntry>) -> Self {
        self.stakes.insert(user, entries);
        self
    }

    pub fn failing_for(mut self, user: Address) -> Self {
        self.failing.insert(user);
        self
    }

    pub fn with_event_users(mut self, users: Vec<Address>) -> Self {
        self.users = users;
        self
    }

    pub fn failing_scan(mut self) -> Self {
        self.fail_scan = true;
        self
    }

    pub fn stake_calls(&self) -> usize {
        self.stake_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StakingClient for MockStakingClient {
    async fn user_stakes(&self, user: Address) -> eyre::Result<Vec<StakeEntry>> {
        self.stake_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&user) {
            return Err(eyre::eyre!("execution reverted"));
        }
        Ok(self.stakes.get(&user).cloned().unwrap_or_default())
    }

    async fn staked_users(&self, _range: BlockRange) -> eyre::Result<Vec<Address>> {
        if self.fail_scan {
            return Err(eyre::eyre!("connection refused"));
        }
        Ok(self.users.clone())
    }
}

/// Stake entry from a raw amount and an expiration in epoch seconds.
pub fn entry(raw_amount: u64, expiration: u64) -> StakeEntry {
    StakeEntry::from_raw(U256::from(raw_amount), U256::from(expiration)).unwrap()
}
