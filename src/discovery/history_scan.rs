use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use super::AddressDiscovery;
use crate::chain::types::normalize_addresses;
use crate::config::HistoryScanConfig;
use crate::retry::retry_with_backoff;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_millis(500);

// Response types
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    message: String,
    result: ExplorerResult,
}

/// `result` is a transaction list on success and a bare error string otherwise
/// (invalid API key, rate limit exceeded).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExplorerResult {
    Transactions(Vec<RawTransaction>),
    Message(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    from: String,
    block_number: String,
}

/// A transaction from the explorer's history endpoint, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerTransaction {
    pub from: String,
    pub block_number: u64,
}

impl TryFrom<RawTransaction> for ExplorerTransaction {
    type Error = eyre::Report;

    fn try_from(raw: RawTransaction) -> eyre::Result<Self> {
        let block_number = raw.block_number.trim().parse::<u64>().map_err(|e| {
            eyre::eyre!("Malformed blockNumber '{}': {}", raw.block_number, e)
        })?;
        Ok(Self {
            from: raw.from,
            block_number,
        })
    }
}

/// Client for an Etherscan-compatible block explorer API.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    url: reqwest::Url,
    api_key: String,
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new(api_url: &str, api_key: String) -> eyre::Result<Self> {
        let url = reqwest::Url::parse(api_url)
            .map_err(|e| eyre::eyre!("Invalid explorer API URL '{}': {}", api_url, e))?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            url,
            api_key,
            client,
        })
    }

    /// Fetch one page of transactions to `address`, ascending from `start_block`.
    pub async fn fetch_transactions(
        &self,
        address: &str,
        start_block: u64,
    ) -> eyre::Result<Vec<ExplorerTransaction>> {
        let start_block = start_block.to_string();
        let response: ExplorerResponse = self
            .client
            .get(self.url.clone())
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("startblock", start_block.as_str()),
                ("sort", "asc"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.result {
            ExplorerResult::Transactions(txs) => {
                txs.into_iter().map(ExplorerTransaction::try_from).collect()
            }
            ExplorerResult::Message(msg) => Err(eyre::eyre!(
                "Explorer API error: {} ({})",
                msg,
                response.message
            )),
        }
    }
}

/// Discovers stakers from the senders of every transaction sent to the contract.
///
/// Pages ascend from `start_block`; the cursor moves to the block after the last
/// transaction of each page. A page shorter than `page_size` ends the scan, so a
/// final page that is exactly full costs one extra (empty) request.
pub struct HistoryScanSource {
    explorer: ExplorerClient,
    contract: String,
    start_block: u64,
    page_size: usize,
    page_delay: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl HistoryScanSource {
    pub fn new(explorer: ExplorerClient, contract: &str, start_block: u64) -> Self {
        Self {
            explorer,
            contract: contract.to_string(),
            start_block,
            page_size: 10_000,
            page_delay: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn from_config(config: &HistoryScanConfig, contract: &str) -> eyre::Result<Self> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| eyre::eyre!("No explorer API key configured"))?;
        let explorer = ExplorerClient::new(&config.api_url, api_key)?;

        Ok(Self::new(explorer, contract, config.start_block)
            .with_page_size(config.page_size)
            .with_page_delay(Duration::from_millis(config.page_delay_ms))
            .with_max_retries(config.max_retries))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Every distinct sender string, exactly as the explorer reports it.
    pub async fn scan_senders(&self) -> eyre::Result<HashSet<String>> {
        let mut senders = HashSet::new();
        let mut cursor = self.start_block;
        let mut pages = 0u64;

        loop {
            let txs = retry_with_backoff(self.max_retries, self.retry_delay, || {
                self.explorer.fetch_transactions(&self.contract, cursor)
            })
            .await?;
            pages += 1;

            let Some(last) = txs.last() else {
                break;
            };
            let next_cursor = last.block_number + 1;
            let count = txs.len();
            senders.extend(txs.into_iter().map(|tx| tx.from));

            tracing::debug!(
                page = pages,
                start_block = cursor,
                next_block = next_cursor,
                transactions = count,
                "Fetched transaction history page"
            );

            cursor = next_cursor;
            if count < self.page_size {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        tracing::info!(pages, senders = senders.len(), "Transaction history scan complete");
        Ok(senders)
    }
}

#[async_trait]
impl AddressDiscovery for HistoryScanSource {
    fn kind(&self) -> &'static str {
        "history_scan"
    }

    async fn discover(&self) -> eyre::Result<BTreeSet<Address>> {
        // Sender casing from the explorer is arbitrary; normalize before use as a key
        let senders = self.scan_senders().await?;
        Ok(normalize_addresses(&senders))
    }
}
