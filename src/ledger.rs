//! Ledger normalization
//!
//! Turns raw export rows into typed [`Transaction`] records grouped by fund.
//! Fund identity is resolved through an explicit [`FundCatalog`] built from the
//! funds list, so resolution is deterministic and independent of process state.
//!
//! Rows are never silently lost: every input row ends up either in a fund's
//! transaction list, in the unresolved list, in the malformed list, or in the
//! account-row count (cash-account movements with no security attached).

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::importers::transactions_csv::{parse_date, parse_decimal};
use crate::importers::RawTransactionRow;
use crate::models::{FundInfo, Transaction, TransactionKind, TransactionStatus};

/// How a row was matched to a fund
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Isin,
    Ticker,
    AlternateTerm,
}

/// Lookup table from identifiers to canonical funds
#[derive(Debug, Clone, Default)]
pub struct FundCatalog {
    funds: Vec<FundInfo>,
    by_isin: HashMap<String, usize>,
    by_ticker: HashMap<String, usize>,
    by_term: HashMap<String, usize>,
}

fn key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn insert_key(map: &mut HashMap<String, usize>, raw: &str, idx: usize, funds: &[FundInfo]) {
    let k = key(raw);
    if k.is_empty() {
        return;
    }
    if let Some(&existing) = map.get(&k) {
        if existing != idx {
            warn!(
                "Identifier '{}' is claimed by both '{}' and '{}'; keeping '{}'",
                raw, funds[existing].slug, funds[idx].slug, funds[existing].slug
            );
        }
        return;
    }
    map.insert(k, idx);
}

impl FundCatalog {
    pub fn new(funds: Vec<FundInfo>) -> Self {
        let mut by_isin = HashMap::new();
        let mut by_ticker = HashMap::new();
        let mut by_term = HashMap::new();

        for (idx, fund) in funds.iter().enumerate() {
            insert_key(&mut by_isin, &fund.isin, idx, &funds);
            if let Some(ticker) = &fund.ticker {
                insert_key(&mut by_ticker, ticker, idx, &funds);
            }
            for alt in &fund.alternative_isins {
                insert_key(&mut by_term, alt, idx, &funds);
            }
            if let Some(index) = &fund.tracked_index {
                insert_key(&mut by_term, index, idx, &funds);
            }
            for term in &fund.additional_terms {
                insert_key(&mut by_term, term, idx, &funds);
            }
            insert_key(&mut by_term, &fund.name, idx, &funds);
        }

        Self {
            funds,
            by_isin,
            by_ticker,
            by_term,
        }
    }

    pub fn get(&self, slug: &str) -> Option<&FundInfo> {
        self.funds.iter().find(|f| f.slug == slug)
    }

    /// Display name for a slug, falling back to the slug itself
    pub fn display_name<'a>(&'a self, slug: &'a str) -> &'a str {
        self.get(slug).map(|f| f.name.as_str()).unwrap_or(slug)
    }

    /// Resolve a row's identifiers: exact ISIN, then ticker, then any
    /// alternate ISIN / tracked index / additional term / fund name.
    pub fn resolve(&self, isin: &str, name: &str) -> Option<(&FundInfo, MatchTier)> {
        let isin_key = key(isin);
        let name_key = key(name);
        let candidates = [isin_key.as_str(), name_key.as_str()];

        if let Some(&idx) = self.by_isin.get(&isin_key) {
            return Some((&self.funds[idx], MatchTier::Isin));
        }

        let lookup = |map: &HashMap<String, usize>| {
            candidates
                .iter()
                .filter(|k| !k.is_empty())
                .find_map(|k| map.get(*k).copied())
        };

        if let Some(idx) = lookup(&self.by_ticker) {
            return Some((&self.funds[idx], MatchTier::Ticker));
        }
        if let Some(idx) = lookup(&self.by_term) {
            return Some((&self.funds[idx], MatchTier::AlternateTerm));
        }
        None
    }
}

/// Output of ledger normalization
#[derive(Debug, Clone, Default)]
pub struct NormalizedLedger {
    /// Fund slug -> transactions ascending by date (input order on ties)
    pub funds: BTreeMap<String, Vec<Transaction>>,
    /// `AnalysisError::UnresolvedTransaction` entries
    pub unresolved: Vec<AnalysisError>,
    /// `AnalysisError::MalformedRow` entries
    pub malformed: Vec<AnalysisError>,
    /// Cash-account rows (deposits, interest, fees) not tied to any security
    pub account_rows: usize,
}

impl NormalizedLedger {
    pub fn transaction_count(&self) -> usize {
        self.funds.values().map(Vec::len).sum()
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed.len()
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_count() == 0
    }

    /// All transactions of every fund, ordered by date (stable)
    pub fn all_transactions(&self) -> Vec<&Transaction> {
        let mut all: Vec<&Transaction> = self.funds.values().flatten().collect();
        all.sort_by_key(|tx| (tx.date, tx.row));
        all
    }
}

struct ParsedRow {
    date: chrono::NaiveDate,
    status: TransactionStatus,
    kind: TransactionKind,
    shares: Option<rust_decimal::Decimal>,
    amount: Option<rust_decimal::Decimal>,
}

fn parse_row(raw: &RawTransactionRow) -> Result<ParsedRow, AnalysisError> {
    let malformed = |reason: String| AnalysisError::MalformedRow {
        row: raw.row,
        reason,
    };

    let date = parse_date(&raw.date)
        .ok_or_else(|| malformed(format!("could not parse date '{}'", raw.date)))?;
    let status = raw
        .status
        .parse::<TransactionStatus>()
        .map_err(|_| malformed(format!("unknown status '{}'", raw.status)))?;
    let shares = parse_decimal(&raw.shares)
        .map_err(|e| malformed(format!("invalid Shares: {}", e)))?;
    let amount = parse_decimal(&raw.amount)
        .map_err(|e| malformed(format!("invalid Amount: {}", e)))?;

    Ok(ParsedRow {
        date,
        status,
        kind: TransactionKind::classify(&raw.tx_type),
        shares,
        amount,
    })
}

/// Normalize raw rows into per-fund transaction sequences
pub fn normalize(rows: &[RawTransactionRow], catalog: &FundCatalog) -> NormalizedLedger {
    let mut ledger = NormalizedLedger::default();

    for raw in rows {
        let parsed = match parse_row(raw) {
            Ok(p) => p,
            Err(e) => {
                debug!("{}", e);
                ledger.malformed.push(e);
                continue;
            }
        };

        let Some((fund, tier)) = catalog.resolve(&raw.isin, &raw.name) else {
            let cash_only = matches!(parsed.kind, TransactionKind::Deposit | TransactionKind::Other);
            if raw.isin.is_empty() && cash_only {
                ledger.account_rows += 1;
            } else {
                ledger.unresolved.push(AnalysisError::UnresolvedTransaction {
                    row: raw.row,
                    name: raw.name.clone(),
                    isin: raw.isin.clone(),
                });
            }
            continue;
        };
        if tier != MatchTier::Isin {
            debug!("Row {} matched '{}' by {:?}", raw.row, fund.slug, tier);
        }

        ledger
            .funds
            .entry(fund.slug.clone())
            .or_default()
            .push(Transaction {
                row: raw.row,
                date: parsed.date,
                status: parsed.status,
                kind: parsed.kind,
                fund: fund.slug.clone(),
                name: raw.name.clone(),
                isin: Some(raw.isin.to_uppercase()).filter(|s| !s.is_empty()),
                shares: parsed.shares,
                amount: parsed.amount,
            });
    }

    for transactions in ledger.funds.values_mut() {
        // Stable: same-date rows keep input order
        transactions.sort_by_key(|tx| tx.date);
    }

    info!(
        "Normalized {} transactions across {} funds ({} unresolved, {} malformed, {} account rows)",
        ledger.transaction_count(),
        ledger.funds.len(),
        ledger.unresolved_count(),
        ledger.malformed_count(),
        ledger.account_rows
    );
    for issue in &ledger.unresolved {
        warn!("{}", issue);
    }

    ledger
}
