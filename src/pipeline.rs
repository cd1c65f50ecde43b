use std::path::Path;
use std::sync::Arc;

use crate::chain::client::{RpcStakingClient, StakingClient};
use crate::chain::types::{normalize_address, BlockRange};
use crate::config::{Config, DiscoveryConfig, FailurePolicy};
use crate::discovery::{discover_addresses, AddressDiscovery, EventScanSource, HistoryScanSource};
use crate::report::{write_csv, CombinedReport};
use crate::staking::table::build_staking_table;

/// Everything needed to produce one chain's staking table.
pub struct ChainJob {
    pub name: String,
    pub client: Arc<dyn StakingClient>,
    pub discovery: Box<dyn AddressDiscovery>,
    pub on_failure: FailurePolicy,
    pub max_concurrent_fetches: usize,
}

/// Per-chain counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub chain: String,
    pub addresses_discovered: usize,
    pub stakers: usize,
    pub rows: usize,
}

/// Drives discovery, stake fetching and table building for each chain in turn,
/// then merges the tables into one report:
/// 1. Address discovery (with the source's failure policy)
/// 2. Per-address stake fetch
/// 3. Table build with per-address totals
/// 4. Concatenation in chain order
pub struct ReportPipeline {
    jobs: Vec<ChainJob>,
    decimals: u8,
}

impl ReportPipeline {
    pub fn new(jobs: Vec<ChainJob>, decimals: u8) -> Self {
        Self { jobs, decimals }
    }

    /// Build RPC clients and discovery sources for every configured chain.
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let contract = normalize_address(&config.contract.address)
            .ok_or_else(|| eyre::eyre!("Invalid contract address '{}'", config.contract.address))?;

        let mut jobs = Vec::with_capacity(config.chains.len());
        for chain in &config.chains {
            let client: Arc<dyn StakingClient> = Arc::new(RpcStakingClient::connect(
                &chain.name,
                &chain.rpc_url,
                contract,
                &config.contract.staked_event,
                config.contract.user_field,
            )?);

            let discovery: Box<dyn AddressDiscovery> = match &chain.discovery {
                DiscoveryConfig::EventScan(scan) => Box::new(EventScanSource::new(
                    client.clone(),
                    BlockRange {
                        from: scan.from_block,
                        to: scan.to_block,
                        chunk_size: scan.log_chunk_size,
                    },
                )),
                DiscoveryConfig::HistoryScan(scan) => Box::new(
                    HistoryScanSource::from_config(scan, &config.contract.address)
                        .map_err(|e| e.wrap_err(format!("Chain '{}'", chain.name)))?,
                ),
            };

            tracing::debug!(
                chain = %chain.name,
                source = discovery.kind(),
                "Chain job configured"
            );

            jobs.push(ChainJob {
                name: chain.name.clone(),
                client,
                discovery,
                on_failure: chain.discovery.on_failure(),
                max_concurrent_fetches: chain.max_concurrent_fetches,
            });
        }

        Ok(Self::new(jobs, config.contract.decimals))
    }

    /// Build every chain's table, strictly one chain after another.
    pub async fn assemble(&self) -> eyre::Result<(CombinedReport, Vec<ChainSummary>)> {
        let mut tables = Vec::with_capacity(self.jobs.len());
        let mut summaries = Vec::with_capacity(self.jobs.len());

        for job in &self.jobs {
            tracing::info!(chain = %job.name, "Fetching stakers...");

            let addresses =
                discover_addresses(job.discovery.as_ref(), &job.name, job.on_failure).await?;

            let table = build_staking_table(
                job.client.as_ref(),
                &job.name,
                &addresses,
                self.decimals,
                job.max_concurrent_fetches,
            )
            .await;

            let summary = ChainSummary {
                chain: job.name.clone(),
                addresses_discovered: addresses.len(),
                stakers: table.staker_count(),
                rows: table.len(),
            };
            tracing::info!(
                chain = %job.name,
                addresses = summary.addresses_discovered,
                stakers = summary.stakers,
                rows = summary.rows,
                "Stakers fetched"
            );

            summaries.push(summary);
            tables.push(table);
        }

        Ok((CombinedReport::concat(tables), summaries))
    }

    /// Assemble the report and write it to `output_path`.
    /// Nothing is written unless every chain completes.
    pub async fn run(&self, output_path: impl AsRef<Path>) -> eyre::Result<Vec<ChainSummary>> {
        let (report, summaries) = self.assemble().await?;
        write_csv(&report, output_path)?;
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{entry, MockStakingClient};
    use alloy::primitives::Address;
    use bigdecimal::BigDecimal;

    fn job(name: &str, client: MockStakingClient, on_failure: FailurePolicy) -> ChainJob {
        let client: Arc<dyn StakingClient> = Arc::new(client);
        let range = BlockRange {
            from: 0,
            to: None,
            chunk_size: None,
        };
        ChainJob {
            name: name.to_string(),
            client: client.clone(),
            discovery: Box::new(EventScanSource::new(client, range)),
            on_failure,
            max_concurrent_fetches: 2,
        }
    }

    #[tokio::test]
    async fn test_rows_follow_chain_order() {
        let a = Address::repeat_byte(0xa);
        let b = Address::repeat_byte(0xb);
        let c = Address::repeat_byte(0xc);

        let eth = MockStakingClient::new()
            .with_event_users(vec![a, b])
            .with_stakes(a, vec![entry(5_000_000_000, 1_700_000_000)]);
        let bsc = MockStakingClient::new()
            .with_event_users(vec![c, c])
            .with_stakes(
                c,
                vec![entry(1_000_000_000, 1_700_000_000), entry(2_000_000_000, 1_800_000_000)],
            );

        let pipeline = ReportPipeline::new(
            vec![
                job("ETH", eth, FailurePolicy::Degrade),
                job("BSC", bsc, FailurePolicy::Propagate),
            ],
            9,
        );
        let (report, summaries) = pipeline.assemble().await.unwrap();

        let chains: Vec<_> = report.rows.iter().map(|r| r.chain.as_str()).collect();
        assert_eq!(chains, vec!["ETH", "BSC", "BSC"]);
        assert_eq!(
            summaries,
            vec![
                ChainSummary {
                    chain: "ETH".to_string(),
                    addresses_discovered: 2,
                    stakers: 1,
                    rows: 1,
                },
                ChainSummary {
                    chain: "BSC".to_string(),
                    addresses_discovered: 1,
                    stakers: 1,
                    rows: 2,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_totals_are_per_chain() {
        let a = Address::repeat_byte(0xa);
        let eth = MockStakingClient::new()
            .with_event_users(vec![a])
            .with_stakes(a, vec![entry(5_000_000_000, 1_700_000_000)]);
        let bsc = MockStakingClient::new()
            .with_event_users(vec![a])
            .with_stakes(a, vec![entry(2_000_000_000, 1_700_000_000)]);

        let pipeline = ReportPipeline::new(
            vec![
                job("ETH", eth, FailurePolicy::Degrade),
                job("BSC", bsc, FailurePolicy::Degrade),
            ],
            9,
        );
        let (report, _) = pipeline.assemble().await.unwrap();

        assert_eq!(report.rows[0].total_staked_amount, BigDecimal::from(5));
        assert_eq!(report.rows[1].total_staked_amount, BigDecimal::from(2));
    }

    #[tokio::test]
    async fn test_degraded_chain_contributes_nothing() {
        let c = Address::repeat_byte(0xc);
        let eth = MockStakingClient::new().failing_scan();
        let bsc = MockStakingClient::new()
            .with_event_users(vec![c])
            .with_stakes(c, vec![entry(1_000_000_000, 1_700_000_000)]);

        let pipeline = ReportPipeline::new(
            vec![
                job("ETH", eth, FailurePolicy::Degrade),
                job("BSC", bsc, FailurePolicy::Propagate),
            ],
            9,
        );
        let (report, summaries) = pipeline.assemble().await.unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.rows[0].chain, "BSC");
        assert_eq!(summaries[0].addresses_discovered, 0);
        assert_eq!(summaries[0].rows, 0);
    }

    #[tokio::test]
    async fn test_propagated_failure_aborts_without_output() {
        let eth = MockStakingClient::new();
        let bsc = MockStakingClient::new().failing_scan();

        let pipeline = ReportPipeline::new(
            vec![
                job("ETH", eth, FailurePolicy::Degrade),
                job("BSC", bsc, FailurePolicy::Propagate),
            ],
            9,
        );

        let path = std::env::temp_dir().join(format!(
            "staking-report-aborted-{}.csv",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();

        assert!(pipeline.run(&path).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_writes_report() {
        let a = Address::repeat_byte(0xa);
        let eth = MockStakingClient::new()
            .with_event_users(vec![a])
            .with_stakes(a, vec![entry(5_000_000_000, 1_700_000_000)]);

        let pipeline = ReportPipeline::new(vec![job("ETH", eth, FailurePolicy::Degrade)], 9);
        let path = std::env::temp_dir().join(format!(
            "staking-report-run-{}.csv",
            std::process::id()
        ));

        let summaries = pipeline.run(&path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(summaries.len(), 1);
        assert_eq!(written.lines().count(), 2);
        assert!(written.lines().nth(1).unwrap().ends_with(",5.0,2023-11-14 22:13:20,ETH,5.0"));
    }

    #[test]
    fn test_from_config_builds_jobs_in_order() {
        let config: Config = toml::from_str(
            r#"
[contract]
address = "0x1e7866b5a5a4f09efd235d28d49568c2fe2f7ecd"

[[chains]]
name = "ETH"
rpc_url = "http://localhost:8545"

[chains.discovery]
kind = "event_scan"
from_block = 100
log_chunk_size = 5000

[[chains]]
name = "BSC"
rpc_url = "http://localhost:8546"

[chains.discovery]
kind = "history_scan"
api_key = "key"
"#,
        )
        .unwrap();

        let pipeline = ReportPipeline::from_config(&config).unwrap();
        let kinds: Vec<_> = pipeline
            .jobs
            .iter()
            .map(|j| (j.name.as_str(), j.discovery.kind(), j.on_failure))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("ETH", "event_scan", FailurePolicy::Degrade),
                ("BSC", "history_scan", FailurePolicy::Propagate),
            ]
        );
        assert_eq!(pipeline.decimals, 9);
    }
}
