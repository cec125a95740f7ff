use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::FundInfo;
use crate::utils::slugify;

/// Parse the funds list (fund metadata table)
pub fn parse_funds_list<P: AsRef<Path>>(file_path: P) -> Result<Vec<FundInfo>> {
    let path = file_path.as_ref();
    info!("Parsing funds list: {:?}", path);

    let bytes = fs::read(path).with_context(|| format!("Failed to open funds list {:?}", path))?;
    parse_funds_reader(bytes.as_slice())
}

pub fn parse_funds_reader<R: Read>(source: R) -> Result<Vec<FundInfo>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);
    let headers = reader
        .headers()
        .context("Failed to read funds list headers")?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };

    let name_idx = column("Fund name").ok_or_else(|| anyhow!("Funds list has no 'Fund name' column"))?;
    let isin_idx = column("ISIN").ok_or_else(|| anyhow!("Funds list has no 'ISIN' column"))?;
    let slug_idx = column("Slug");
    let ticker_idx = column("Ticker");
    let alt_idx = column("Alternative ISINs");
    let index_idx = column("Tracked index");
    let terms_idx = column("Additional terms (|-separated)").or_else(|| column("Additional terms"));

    let mut funds = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read funds list record")?;
        let name = cell(&record, Some(name_idx));
        if name.is_empty() {
            warn!("Skipping funds list row {}: empty fund name", idx + 2);
            continue;
        }

        let slug = match cell(&record, slug_idx) {
            s if s.is_empty() => slugify(&name),
            s => s,
        };

        funds.push(FundInfo {
            slug,
            isin: cell(&record, Some(isin_idx)).to_uppercase(),
            ticker: non_empty(cell(&record, ticker_idx)),
            alternative_isins: split_list(&cell(&record, alt_idx), ','),
            tracked_index: non_empty(cell(&record, index_idx)),
            additional_terms: split_list(&cell(&record, terms_idx), '|'),
            name,
        });
    }

    debug!("Loaded {} funds", funds.len());
    Ok(funds)
}

fn cell(record: &StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_funds_list() {
        let csv = "Fund name,Slug,ISIN,Ticker,Alternative ISINs,Tracked index,Additional terms (|-separated)\n\
                   iShares Core MSCI World,,IE00B4L5Y983,EUNL,\"IE00B4L5YC18, IE00BKM4GZ66\",MSCI World,Core World|SWDA\n\
                   Xtrackers EM,xtrackers-em,IE00BTJRMP35,XMME,,,\n";
        let funds = parse_funds_reader(csv.as_bytes()).unwrap();
        assert_eq!(funds.len(), 2);

        let world = &funds[0];
        assert_eq!(world.slug, "ishares-core-msci-world");
        assert_eq!(world.ticker.as_deref(), Some("EUNL"));
        assert_eq!(world.alternative_isins, vec!["IE00B4L5YC18", "IE00BKM4GZ66"]);
        assert_eq!(world.additional_terms, vec!["Core World", "SWDA"]);
        assert_eq!(world.tracked_index.as_deref(), Some("MSCI World"));

        assert_eq!(funds[1].slug, "xtrackers-em");
        assert!(funds[1].alternative_isins.is_empty());
        assert_eq!(funds[1].tracked_index, None);
    }

    #[test]
    fn test_minimal_columns_are_enough() {
        let csv = "ISIN,Fund name\nLU0274208692,Xtrackers MSCI World Swap\n";
        let funds = parse_funds_reader(csv.as_bytes()).unwrap();
        assert_eq!(funds[0].slug, "xtrackers-msci-world-swap");
        assert_eq!(funds[0].ticker, None);
    }

    #[test]
    fn test_missing_isin_column_fails() {
        let csv = "Fund name\nSomething\n";
        assert!(parse_funds_reader(csv.as_bytes()).is_err());
    }
}
