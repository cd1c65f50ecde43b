use crate::staking::table::{StakingRow, StakingTable};

pub mod writer;

pub use writer::write_csv;

/// All chains' rows, in chain order, each chain's rows in their built order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedReport {
    pub rows: Vec<StakingRow>,
}

impl CombinedReport {
    /// Concatenate per-chain tables. Empty tables contribute nothing.
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = StakingTable>,
    {
        let rows = tables.into_iter().flat_map(|t| t.rows).collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
