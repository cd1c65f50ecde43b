use alloy::primitives::{keccak256, Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use alloy::sol;
use async_trait::async_trait;

use super::decoder::decode_staked_user;
use super::types::{BlockRange, StakeEntry, UserField};

// Read-only slice of the staking contract ABI.
sol! {
    #[sol(rpc)]
    contract StakingContract {
        struct Stake {
            uint256 amount;
            uint256 expirationTimestamp;
        }

        function getUserStakes(address user) external view returns (Stake[] memory);
    }
}

/// Read-only access to one chain's deployment of the staking contract.
#[async_trait]
pub trait StakingClient: Send + Sync {
    /// Stake entries currently held by `user`.
    async fn user_stakes(&self, user: Address) -> eyre::Result<Vec<StakeEntry>>;

    /// The `user` field of every staking event emitted in `range`.
    async fn staked_users(&self, range: BlockRange) -> eyre::Result<Vec<Address>>;
}

/// [`StakingClient`] backed by a JSON-RPC node.
pub struct RpcStakingClient {
    chain: String,
    provider: DynProvider,
    contract: Address,
    staked_event: String,
    staked_event_hash: B256,
    user_field: UserField,
}

impl RpcStakingClient {
    pub fn connect(
        chain: &str,
        rpc_url: &str,
        contract: Address,
        staked_event: &str,
        user_field: UserField,
    ) -> eyre::Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.parse().map_err(|e| {
                eyre::eyre!("Invalid RPC URL for chain '{}': {}", chain, e)
            })?)
            .erased();

        Ok(Self {
            chain: chain.to_string(),
            provider,
            contract,
            staked_event: staked_event.to_string(),
            staked_event_hash: keccak256(staked_event.as_bytes()),
            user_field,
        })
    }

    async fn scan_chunk(&self, from: u64, to: BlockNumberOrTag) -> eyre::Result<Vec<Address>> {
        let filter = Filter::new()
            .address(self.contract)
            .event(&self.staked_event)
            .from_block(from)
            .to_block(to);

        let logs = self.provider.get_logs(&filter).await?;
        let users: Vec<Address> = logs
            .iter()
            .filter_map(|log| {
                decode_staked_user(log, self.contract, self.staked_event_hash, self.user_field)
            })
            .collect();

        tracing::debug!(
            chain = %self.chain,
            from,
            to = %to,
            logs = logs.len(),
            users = users.len(),
            "Scanned staking events"
        );
        Ok(users)
    }
}

#[async_trait]
impl StakingClient for RpcStakingClient {
    async fn user_stakes(&self, user: Address) -> eyre::Result<Vec<StakeEntry>> {
        let contract = StakingContract::new(self.contract, self.provider.clone());
        let stakes = contract.getUserStakes(user).call().await?;

        let mut entries = Vec::with_capacity(stakes.len());
        for stake in stakes {
            match StakeEntry::from_raw(stake.amount, stake.expirationTimestamp) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        chain = %self.chain,
                        user = %user,
                        error = %e,
                        "Malformed stake entry, skipping"
                    );
                }
            }
        }
        Ok(entries)
    }

    async fn staked_users(&self, range: BlockRange) -> eyre::Result<Vec<Address>> {
        let Some(chunk_size) = range.chunk_size else {
            let to = range
                .to
                .map(BlockNumberOrTag::Number)
                .unwrap_or(BlockNumberOrTag::Latest);
            return self.scan_chunk(range.from, to).await;
        };

        let end = match range.to {
            Some(to) => to,
            None => self.provider.get_block_number().await?,
        };

        let mut users = Vec::new();
        for (from, to) in block_chunks(range.from, end, chunk_size) {
            users.extend(self.scan_chunk(from, BlockNumberOrTag::Number(to)).await?);
        }
        Ok(users)
    }
}

/// Split `[from, to]` into consecutive inclusive ranges of at most `size` blocks.
pub fn block_chunks(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = from;
    while current <= to {
        let end = std::cmp::min(current.saturating_add(size - 1), to);
        chunks.push((current, end));
        if end == u64::MAX {
            break;
        }
        current = end + 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_chunks() {
        assert_eq!(block_chunks(0, 9, 5), vec![(0, 4), (5, 9)]);
        assert_eq!(block_chunks(10, 12, 5), vec![(10, 12)]);
        assert_eq!(block_chunks(7, 7, 100), vec![(7, 7)]);
        assert!(block_chunks(8, 7, 100).is_empty());
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        let result = RpcStakingClient::connect(
            "ETH",
            "not a url",
            Address::ZERO,
            "Staked(address,uint256,uint256)",
            UserField::Auto,
        );
        assert!(result.is_err());
    }
}
