pub mod fetcher;
pub mod table;

pub use fetcher::fetch_user_stakes;
pub use table::{build_staking_table, scale_amount, StakingRow, StakingTable};
