use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::AnalysisError;

const REQUIRED_COLUMNS: [&str; 7] = ["Date", "Status", "Type", "Name", "ISIN", "Shares", "Amount"];

/// One row of a broker transaction export, as text.
///
/// Typing and validation happen in the ledger normalizer so that malformed
/// rows are counted there instead of failing the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransactionRow {
    /// Row number in the file (header is row 1)
    pub row: usize,
    pub date: String,
    pub status: String,
    pub tx_type: String,
    pub name: String,
    pub isin: String,
    pub shares: String,
    pub amount: String,
}

#[derive(Debug)]
struct ColumnMapping {
    date: usize,
    status: usize,
    tx_type: usize,
    name: usize,
    isin: usize,
    shares: usize,
    amount: usize,
}

/// Parse a transaction export file
pub fn parse_transactions_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransactionRow>> {
    let path = file_path.as_ref();
    info!("Parsing transactions CSV file: {:?}", path);

    let bytes = fs::read(path).with_context(|| format!("Failed to open CSV file {:?}", path))?;
    parse_transactions_reader(bytes.as_slice())
}

/// Parse a transaction export from any reader (comma or semicolon separated)
pub fn parse_transactions_reader<R: Read>(mut source: R) -> Result<Vec<RawTransactionRow>> {
    let mut content = String::new();
    source
        .read_to_string(&mut content)
        .context("Failed to read transactions CSV as UTF-8 text")?;
    let content = content.trim_start_matches('\u{feff}');

    let delimiter = detect_delimiter(content);
    debug!("Using CSV delimiter {:?}", delimiter as char);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true) // Trailing empty columns are common in broker exports
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    debug!("CSV headers: {:?}", headers);

    let mapping = find_columns(&headers)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        // Physical line of the record start; the reader's own line count skips blank lines
        let row = record
            .position()
            .and_then(|p| content.as_bytes().get(..p.byte() as usize))
            .map(|before| before.iter().filter(|b| **b == b'\n').count() + 1)
            .unwrap_or(idx + 2);
        rows.push(RawTransactionRow {
            row,
            date: field(mapping.date),
            status: field(mapping.status),
            tx_type: field(mapping.tx_type),
            name: field(mapping.name),
            isin: field(mapping.isin),
            shares: field(mapping.shares),
            amount: field(mapping.amount),
        });
    }

    info!("Read {} transaction rows from CSV", rows.len());
    Ok(rows)
}

fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn find_columns(headers: &StringRecord) -> Result<ColumnMapping> {
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| position(**c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingColumns(missing).into());
    }

    let index = |name: &str| position(name).unwrap_or_default();
    Ok(ColumnMapping {
        date: index("Date"),
        status: index("Status"),
        tx_type: index("Type"),
        name: index("Name"),
        isin: index("ISIN"),
        shares: index("Shares"),
        amount: index("Amount"),
    })
}

/// Parse a date cell. Timestamps are reduced to their UTC calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts.date());
        }
    }
    None
}

/// Parse a monetary/share cell.
///
/// Blank cells are `Ok(None)`; text that is not a number is an error.
/// Accepts `1234.56`, `1,234.56`, `1.234,56` and `1234,56`, with an optional
/// currency sign.
pub fn parse_decimal(text: &str) -> Result<Option<Decimal>> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '€' | '$' | '\''))
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    let value = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .with_context(|| format!("'{}' is not a number", text.trim()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_formats() {
        assert_eq!(parse_decimal("1234.56").unwrap(), Some(dec!(1234.56)));
        assert_eq!(parse_decimal("-1,234.56").unwrap(), Some(dec!(-1234.56)));
        assert_eq!(parse_decimal("1.234,56").unwrap(), Some(dec!(1234.56)));
        assert_eq!(parse_decimal("-12,5").unwrap(), Some(dec!(-12.5)));
        assert_eq!(parse_decimal("€ 10").unwrap(), Some(dec!(10)));
        assert_eq!(parse_decimal("  ").unwrap(), None);
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15"), Some(expected));
        assert_eq!(parse_date("15.03.2024"), Some(expected));
        assert_eq!(parse_date("2024-03-15T23:30:00+00:00"), Some(expected));
        assert_eq!(parse_date("2024-03-16T00:30:00+02:00"), Some(expected));
        assert_eq!(parse_date("2024-03-15 10:00:00"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_semicolon_export_is_read() {
        let csv = "Date;Status;Type;Name;ISIN;Shares;Amount\n\
                   2024-01-02;Settled;Buy;World ETF;IE00B4L5Y983;2;-150,20\n\
                   \n\
                   2024-01-03;Pending;Buy;World ETF;IE00B4L5Y983;1;\n";
        let rows = parse_transactions_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[0].amount, "-150,20");
        assert_eq!(rows[1].row, 4);
        assert_eq!(rows[1].status, "Pending");
        assert_eq!(rows[1].amount, "");
    }

    #[test]
    fn test_row_numbers_count_blank_lines() {
        let csv = "Date,Status,Type,Name,ISIN,Shares,Amount\r\n\
                   \r\n\
                   \r\n\
                   2024-01-02,Settled,Buy,World ETF,IE00B4L5Y983,2,-150\r\n\
                   2024-01-03,Settled,Buy,World ETF,IE00B4L5Y983,1,-75\r\n";
        let rows = parse_transactions_reader(csv.as_bytes()).unwrap();
        let numbers: Vec<usize> = rows.iter().map(|r| r.row).collect();
        assert_eq!(numbers, vec![4, 5]);
    }

    #[test]
    fn test_missing_columns_is_fatal() {
        let csv = "Date,Status,Type,Name\n2024-01-02,Settled,Buy,X\n";
        let err = parse_transactions_reader(csv.as_bytes()).unwrap_err();
        match err.downcast_ref::<AnalysisError>() {
            Some(AnalysisError::MissingColumns(cols)) => {
                assert_eq!(cols, &vec!["ISIN".to_string(), "Shares".to_string(), "Amount".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
