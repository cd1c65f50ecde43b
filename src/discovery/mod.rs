use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::config::FailurePolicy;

pub mod event_scan;
pub mod history_scan;

pub use event_scan::EventScanSource;
pub use history_scan::HistoryScanSource;

/// Enumerates the candidate addresses that may hold stakes on one chain.
/// Returned addresses are already in canonical form and deduplicated.
#[async_trait]
pub trait AddressDiscovery: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn discover(&self) -> eyre::Result<BTreeSet<Address>>;
}

/// Run a discovery source, applying its failure policy.
///
/// Under [`FailurePolicy::Degrade`] a failed scan yields an empty set, which
/// callers cannot tell apart from "nobody staked".
pub async fn discover_addresses(
    source: &dyn AddressDiscovery,
    chain: &str,
    policy: FailurePolicy,
) -> eyre::Result<BTreeSet<Address>> {
    match source.discover().await {
        Ok(addresses) => {
            tracing::info!(
                chain = %chain,
                source = source.kind(),
                addresses = addresses.len(),
                "Address discovery complete"
            );
            Ok(addresses)
        }
        Err(e) => match policy {
            FailurePolicy::Degrade => {
                tracing::error!(
                    chain = %chain,
                    source = source.kind(),
                    error = %e,
                    "Address discovery failed, continuing with no addresses"
                );
                Ok(BTreeSet::new())
            }
            FailurePolicy::Propagate => Err(e.wrap_err(format!(
                "Address discovery ({}) failed on chain '{}'",
                source.kind(),
                chain
            ))),
        },
    }
}
