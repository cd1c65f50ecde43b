use serde::Deserialize;
use std::collections::HashSet;

use crate::chain::types::UserField;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    pub contract: ContractConfig,
    pub chains: Vec<ChainConfig>,
}

fn default_output_path() -> String {
    "staking_data_combined.csv".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContractConfig {
    pub address: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_staked_event")]
    pub staked_event: String,
    /// Position of the staker address in the event log.
    #[serde(default)]
    pub user_field: UserField,
}

fn default_decimals() -> u8 {
    9
}

fn default_staked_event() -> String {
    "Staked(address,uint256,uint256)".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_url: String,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    pub discovery: DiscoveryConfig,
}

fn default_max_concurrent_fetches() -> usize {
    1
}

/// What to do when an address discovery source fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and continue with no addresses for the chain.
    Degrade,
    /// Abort the run.
    Propagate,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryConfig {
    EventScan(EventScanConfig),
    HistoryScan(HistoryScanConfig),
}

impl DiscoveryConfig {
    pub fn on_failure(&self) -> FailurePolicy {
        match self {
            Self::EventScan(c) => c.on_failure,
            Self::HistoryScan(c) => c.on_failure,
        }
    }
}

// ============================================================
// Event Scan Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct EventScanConfig {
    #[serde(default)]
    pub from_block: u64,
    pub to_block: Option<u64>,
    pub log_chunk_size: Option<u64>,
    #[serde(default = "default_event_scan_policy")]
    pub on_failure: FailurePolicy,
}

fn default_event_scan_policy() -> FailurePolicy {
    FailurePolicy::Degrade
}

// ============================================================
// History Scan Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryScanConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    #[serde(default = "default_history_start_block")]
    pub start_block: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_history_scan_policy")]
    pub on_failure: FailurePolicy,
}

fn default_api_url() -> String {
    "https://api.bscscan.com/api".to_string()
}

fn default_history_start_block() -> u64 {
    34_181_130
}

fn default_page_size() -> usize {
    10_000
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_history_scan_policy() -> FailurePolicy {
    FailurePolicy::Propagate
}

impl HistoryScanConfig {
    /// The API key, taken from the config file first and then from `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        let address = &self.contract.address;
        if !address.starts_with("0x")
            || address.len() != 42
            || !address[2..].chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(eyre::eyre!("Invalid contract address '{}'", address));
        }
        // 10^77 is the largest power of ten below U256::MAX
        if self.contract.decimals > 77 {
            return Err(eyre::eyre!(
                "Contract decimals must be at most 77, got {}",
                self.contract.decimals
            ));
        }
        if self.contract.user_field == UserField::Topic(0) {
            return Err(eyre::eyre!(
                "Contract user_field cannot be topic 0, which holds the event signature"
            ));
        }
        if self.chains.is_empty() {
            return Err(eyre::eyre!("At least one chain must be configured"));
        }

        let mut names = HashSet::new();
        for chain in &self.chains {
            if !names.insert(chain.name.as_str()) {
                return Err(eyre::eyre!("Chain '{}' is configured twice", chain.name));
            }
            if chain.max_concurrent_fetches == 0 {
                return Err(eyre::eyre!(
                    "Chain '{}' must allow at least one concurrent fetch",
                    chain.name
                ));
            }
            match &chain.discovery {
                DiscoveryConfig::EventScan(scan) => {
                    if scan.log_chunk_size == Some(0) {
                        return Err(eyre::eyre!(
                            "Chain '{}' has a zero log_chunk_size",
                            chain.name
                        ));
                    }
                    if let Some(to) = scan.to_block {
                        if to < scan.from_block {
                            return Err(eyre::eyre!(
                                "Chain '{}' scans an empty block range {}..{}",
                                chain.name,
                                scan.from_block,
                                to
                            ));
                        }
                    }
                }
                DiscoveryConfig::HistoryScan(scan) => {
                    if scan.page_size == 0 {
                        return Err(eyre::eyre!("Chain '{}' has a zero page_size", chain.name));
                    }
                    if scan.resolve_api_key().is_none() {
                        return Err(eyre::eyre!(
                            "Chain '{}' uses history scan but no API key is configured",
                            chain.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
