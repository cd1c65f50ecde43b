use alloy::primitives::Address;

use crate::chain::client::StakingClient;
use crate::chain::types::StakeEntry;

/// Fetch the stake entries held by one address.
///
/// Returns `None` when the read call fails, after logging it. A single failure
/// is final for this run: there is no retry.
pub async fn fetch_user_stakes(
    client: &dyn StakingClient,
    chain: &str,
    address: Address,
) -> Option<Vec<StakeEntry>> {
    match client.user_stakes(address).await {
        Ok(stakes) => Some(stakes),
        Err(e) => {
            tracing::warn!(
                chain = %chain,
                address = %address,
                error = %e,
                "Error fetching stakes, skipping address"
            );
            None
        }
    }
}
