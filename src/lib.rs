pub mod chain;
pub mod config;
pub mod discovery;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod staking;
