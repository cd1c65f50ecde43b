use bigdecimal::BigDecimal;
use serde::Serialize;
use std::path::Path;

use super::CombinedReport;
use crate::chain::types::checksum;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    address: String,
    staking_amount: String,
    expiration_date: String,
    chain: &'a str,
    total_staked_amount: String,
}

/// Write the report as CSV with a header row, replacing any existing file.
pub fn write_csv(report: &CombinedReport, path: impl AsRef<Path>) -> eyre::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| eyre::eyre!("Failed to create output file '{}': {}", path.display(), e))?;

    // Written explicitly so an empty report still carries the header
    writer.write_record([
        "address",
        "staking_amount",
        "expiration_date",
        "chain",
        "total_staked_amount",
    ])?;

    for row in &report.rows {
        writer.serialize(CsvRow {
            address: checksum(&row.address),
            staking_amount: format_amount(&row.staking_amount),
            expiration_date: row.expiration_date.format(DATE_FORMAT).to_string(),
            chain: &row.chain,
            total_staked_amount: format_amount(&row.total_staked_amount),
        })?;
    }

    writer.flush()?;
    tracing::info!(rows = report.len(), path = %path.display(), "Report written");
    Ok(())
}

/// Plain decimal without trailing zeros; whole numbers keep one decimal place.
/// Never switches to exponent notation, however small the amount.
fn format_amount(amount: &BigDecimal) -> String {
    let plain = amount.normalized().to_plain_string();
    if plain.contains('.') {
        plain
    } else {
        format!("{}.0", plain)
    }
}
