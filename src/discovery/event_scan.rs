use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::AddressDiscovery;
use crate::chain::client::StakingClient;
use crate::chain::types::BlockRange;

/// Discovers stakers from the `user` field of the contract's staking events.
pub struct EventScanSource {
    client: Arc<dyn StakingClient>,
    range: BlockRange,
}

impl EventScanSource {
    pub fn new(client: Arc<dyn StakingClient>, range: BlockRange) -> Self {
        Self { client, range }
    }
}

#[async_trait]
impl AddressDiscovery for EventScanSource {
    fn kind(&self) -> &'static str {
        "event_scan"
    }

    async fn discover(&self) -> eyre::Result<BTreeSet<Address>> {
        tracing::info!(
            from = self.range.from,
            to = ?self.range.to,
            "Scanning staking events"
        );
        let users = self.client.staked_users(self.range).await?;
        Ok(users.into_iter().collect())
    }
}
