use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::transactions_csv::parse_decimal;

/// Externally supplied current value of one holding
#[derive(Debug, Clone, PartialEq)]
pub struct MarketValue {
    pub isin: String,
    pub value: Decimal,
}

/// Parse a holdings statement with an `ISIN` column and a market value column
/// (any header containing "Market Value", e.g. "2025-09-30 Market Value in Account").
pub fn parse_market_values<P: AsRef<Path>>(file_path: P) -> Result<Vec<MarketValue>> {
    let path = file_path.as_ref();
    info!("Parsing market values: {:?}", path);

    let bytes =
        fs::read(path).with_context(|| format!("Failed to open market values file {:?}", path))?;
    parse_market_values_reader(bytes.as_slice())
}

pub fn parse_market_values_reader<R: Read>(source: R) -> Result<Vec<MarketValue>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);
    let headers = reader
        .headers()
        .context("Failed to read market values headers")?
        .clone();

    let isin_idx = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ISIN"))
        .ok_or_else(|| anyhow!("Market values file has no 'ISIN' column"))?;
    let value_idx = headers
        .iter()
        .position(|h| h.to_lowercase().contains("market value"))
        .ok_or_else(|| anyhow!("Market values file has no 'Market Value' column"))?;

    let mut values = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read market values record")?;
        let isin = record.get(isin_idx).unwrap_or("").trim().to_uppercase();
        if isin.is_empty() {
            continue;
        }
        match parse_decimal(record.get(value_idx).unwrap_or("")) {
            Ok(Some(value)) => values.push(MarketValue { isin, value }),
            Ok(None) => warn!("No market value for {}", isin),
            Err(e) => warn!("Skipping market value for {}: {}", isin, e),
        }
    }

    Ok(values)
}
