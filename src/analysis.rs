//! Analysis pipeline
//!
//! Each fund is analyzed by a pure function of its own ledger slice (prices,
//! holdings, yearly returns, cash flows, summary row). Funds are fanned out
//! with rayon and joined before the portfolio aggregates are computed.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, Result};
use crate::importers::MarketValue;
use crate::ledger::{FundCatalog, NormalizedLedger};
use crate::models::Transaction;
use crate::reports::cashflow::{transaction_cash_flows, CashFlow, Valuation};
use crate::reports::holdings::ShareHistory;
use crate::reports::prices::{reconstruct_prices, PriceSeries};
use crate::reports::summary::{summarize, summarize_portfolio, InvestmentSummary};
use crate::reports::xirr::XirrOptions;
use crate::reports::yearly::{
    fund_yearly_returns, portfolio_yearly_returns, FundYearlyReturn, PortfolioYearlyReturn,
};

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Valuation date; defaults to the latest settled transaction date
    pub as_of: Option<NaiveDate>,
    /// External current value per fund slug, overriding shares × latest price
    pub market_values: HashMap<String, Decimal>,
    pub xirr: XirrOptions,
}

#[derive(Debug, Clone)]
pub struct FundAnalysis {
    pub fund: String,
    pub name: String,
    pub prices: PriceSeries,
    pub shares: ShareHistory,
    pub yearly: Vec<FundYearlyReturn>,
    pub cash_flows: Vec<CashFlow>,
    pub summary: InvestmentSummary,
    pub xirr_error: Option<AnalysisError>,
}

/// Counts surfaced alongside the reports
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostics {
    pub transactions: usize,
    pub funds: usize,
    pub unresolved_rows: usize,
    pub malformed_rows: usize,
    pub account_rows: usize,
    pub insufficient_cash_flow: usize,
    pub xirr_not_converged: usize,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub as_of: NaiveDate,
    /// Ordered by fund slug
    pub funds: Vec<FundAnalysis>,
    pub portfolio_yearly: Vec<PortfolioYearlyReturn>,
    pub portfolio_summary: InvestmentSummary,
    pub diagnostics: Diagnostics,
}

impl AnalysisReport {
    pub fn fund(&self, slug: &str) -> Option<&FundAnalysis> {
        self.funds.iter().find(|f| f.fund == slug)
    }
}

/// Map market values keyed by ISIN onto fund slugs.
/// Values whose ISIN matches no fund are reported and ignored.
pub fn market_values_by_slug(
    catalog: &FundCatalog,
    values: &[MarketValue],
) -> HashMap<String, Decimal> {
    let mut by_slug = HashMap::new();
    for mv in values {
        match catalog.resolve(&mv.isin, "") {
            Some((fund, _)) => {
                *by_slug.entry(fund.slug.clone()).or_insert(Decimal::ZERO) += mv.value;
            }
            None => warn!("Market value for unknown ISIN {} ignored", mv.isin),
        }
    }
    by_slug
}

/// Latest settled transaction date across the ledger, falling back to the
/// latest date of any transaction
pub fn default_as_of(ledger: &NormalizedLedger) -> Option<NaiveDate> {
    let all = ledger.all_transactions();
    all.iter()
        .filter(|tx| tx.is_settled())
        .map(|tx| tx.date)
        .max()
        .or_else(|| all.iter().map(|tx| tx.date).max())
}

/// Analyze one fund's transactions up to `as_of`
pub fn analyze_fund(
    fund: &str,
    name: &str,
    transactions: &[Transaction],
    as_of: NaiveDate,
    market_value: Option<Decimal>,
    xirr_options: &XirrOptions,
) -> FundAnalysis {
    let slice: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| tx.date <= as_of)
        .cloned()
        .collect();

    let prices = reconstruct_prices(fund, &slice);
    let shares = ShareHistory::from_transactions(&slice);
    let yearly = fund_yearly_returns(&prices, as_of);
    let cash_flows = transaction_cash_flows(&slice);

    let current_shares = shares.shares_as_of(as_of).max(Decimal::ZERO);
    let latest_price = prices.last_on_or_before(as_of).map(|(_, o)| o.implied_price);

    let current_value = match (market_value, latest_price) {
        (Some(value), _) => value,
        (None, Some(price)) => current_shares.checked_mul(price).unwrap_or_else(|| {
            warn!(
                "{}: {} shares at {} is out of range, valued at 0",
                fund, current_shares, price
            );
            Decimal::ZERO
        }),
        (None, None) => {
            if current_shares > Decimal::ZERO {
                warn!(
                    "{}: {} shares held but no implied price, valued at 0",
                    fund, current_shares
                );
            }
            Decimal::ZERO
        }
    };

    let outcome = summarize(
        fund,
        cash_flows.clone(),
        Valuation {
            date: as_of,
            value: current_value,
        },
        xirr_options,
    );
    let mut summary = outcome.summary;
    summary.current_shares = Some(current_shares);
    summary.latest_price = latest_price;

    debug!(
        "{}: {} prices, {} yearly returns, {} cash flows",
        fund,
        prices.len(),
        yearly.len(),
        cash_flows.len()
    );

    FundAnalysis {
        fund: fund.to_string(),
        name: name.to_string(),
        prices,
        shares,
        yearly,
        cash_flows,
        summary,
        xirr_error: outcome.xirr_error,
    }
}

/// Run the full analysis over a normalized ledger.
///
/// Fails only when the ledger holds no transactions at all.
pub fn analyze(
    ledger: &NormalizedLedger,
    catalog: &FundCatalog,
    options: &AnalysisOptions,
) -> Result<AnalysisReport> {
    if ledger.is_empty() {
        return Err(AnalysisError::EmptyLedger.into());
    }
    let as_of = match options.as_of.or_else(|| default_as_of(ledger)) {
        Some(date) => date,
        None => return Err(AnalysisError::EmptyLedger.into()),
    };
    info!("Valuing {} funds as of {}", ledger.funds.len(), as_of);

    let slices: Vec<(&String, &Vec<Transaction>)> = ledger
        .funds
        .iter()
        .filter(|(fund, txs)| {
            let in_range = txs.iter().any(|tx| tx.date <= as_of);
            if !in_range {
                debug!("{}: no transactions on or before {}", fund, as_of);
            }
            in_range
        })
        .collect();

    let funds: Vec<FundAnalysis> = slices
        .par_iter()
        .map(|(fund, txs)| {
            analyze_fund(
                fund,
                catalog.display_name(fund),
                txs,
                as_of,
                options.market_values.get(*fund).copied(),
                &options.xirr,
            )
        })
        .collect();

    let holdings: HashMap<&str, &ShareHistory> =
        funds.iter().map(|f| (f.fund.as_str(), &f.shares)).collect();
    let all_yearly: Vec<FundYearlyReturn> =
        funds.iter().flat_map(|f| f.yearly.iter().cloned()).collect();
    let portfolio_yearly = portfolio_yearly_returns(&all_yearly, |fund, date| {
        holdings
            .get(fund)
            .map(|h| h.shares_as_of(date))
            .unwrap_or(Decimal::ZERO)
    });

    let total_value: Decimal = funds.iter().map(|f| f.summary.current_value).sum();
    let portfolio = summarize_portfolio(
        funds.iter().map(|f| f.cash_flows.as_slice()),
        Valuation {
            date: as_of,
            value: total_value,
        },
        &options.xirr,
    );

    let mut diagnostics = Diagnostics {
        transactions: ledger.transaction_count(),
        funds: funds.len(),
        unresolved_rows: ledger.unresolved_count(),
        malformed_rows: ledger.malformed_count(),
        account_rows: ledger.account_rows,
        ..Diagnostics::default()
    };
    for error in funds.iter().filter_map(|f| f.xirr_error.as_ref()) {
        match error {
            AnalysisError::InsufficientCashFlow { .. } => diagnostics.insufficient_cash_flow += 1,
            AnalysisError::XirrNotConverged { .. } => diagnostics.xirr_not_converged += 1,
            _ => {}
        }
    }

    info!(
        "Analyzed {} funds: {} without XIRR (insufficient flows {}, not converged {})",
        diagnostics.funds,
        diagnostics.insufficient_cash_flow + diagnostics.xirr_not_converged,
        diagnostics.insufficient_cash_flow,
        diagnostics.xirr_not_converged
    );

    Ok(AnalysisReport {
        as_of,
        funds,
        portfolio_yearly,
        portfolio_summary: portfolio.summary,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FundInfo, TransactionKind, TransactionStatus};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn buy(fund: &str, date: NaiveDate, shares: Decimal, amount: Decimal) -> Transaction {
        Transaction {
            row: 0,
            date,
            status: TransactionStatus::Settled,
            kind: TransactionKind::Buy,
            fund: fund.into(),
            name: fund.to_uppercase(),
            isin: None,
            shares: Some(shares),
            amount: Some(amount),
        }
    }

    fn fund_info(slug: &str, isin: &str) -> FundInfo {
        FundInfo {
            slug: slug.into(),
            name: slug.to_uppercase(),
            isin: isin.into(),
            ticker: None,
            alternative_isins: vec![],
            tracked_index: None,
            additional_terms: vec![],
        }
    }

    fn ledger(funds: Vec<(&str, Vec<Transaction>)>) -> NormalizedLedger {
        NormalizedLedger {
            funds: funds
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            ..NormalizedLedger::default()
        }
    }

    #[test]
    fn test_empty_ledger_is_fatal() {
        let err = analyze(
            &NormalizedLedger::default(),
            &FundCatalog::default(),
            &AnalysisOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AnalysisError>(),
            Some(&AnalysisError::EmptyLedger)
        );
    }

    #[test]
    fn test_scenario_with_external_valuation() {
        let ledger = ledger(vec![(
            "x",
            vec![
                buy("x", d(2023, 1, 1), dec!(10), dec!(-1000)),
                buy("x", d(2024, 1, 1), dec!(10), dec!(-1200)),
            ],
        )]);
        let options = AnalysisOptions {
            as_of: Some(d(2024, 6, 1)),
            market_values: HashMap::from([("x".to_string(), dec!(2600))]),
            xirr: XirrOptions::default(),
        };

        let report = analyze(&ledger, &FundCatalog::default(), &options).unwrap();
        let x = report.fund("x").unwrap();
        assert_eq!(x.summary.net_invested, dec!(2200));
        assert_eq!(x.summary.current_value, dec!(2600));
        assert!((x.summary.total_return_pct.unwrap() - dec!(0.1818)).abs() < dec!(0.0001));
        assert!(x.summary.xirr.unwrap() > 0.0);
        assert_eq!(x.summary.current_shares, Some(dec!(20)));
        assert_eq!(x.summary.latest_price, Some(dec!(120)));

        // Both buys fall on January 1st, so every year has a single anchor
        assert!(x.yearly.is_empty());
    }

    #[test]
    fn test_valuation_from_latest_price_and_as_of_default() {
        let ledger = ledger(vec![
            (
                "a",
                vec![
                    buy("a", d(2022, 3, 1), dec!(10), dec!(-100)),
                    buy("a", d(2023, 3, 1), dec!(10), dec!(-150)),
                ],
            ),
            ("b", vec![buy("b", d(2023, 5, 1), dec!(4), dec!(-200))]),
        ]);
        let report = analyze(&ledger, &FundCatalog::default(), &AnalysisOptions::default()).unwrap();

        assert_eq!(report.as_of, d(2023, 5, 1));
        assert_eq!(report.funds.len(), 2);
        assert_eq!(report.funds[0].fund, "a");
        assert_eq!(report.fund("a").unwrap().summary.current_value, dec!(300));
        assert_eq!(report.fund("b").unwrap().summary.current_value, dec!(200));

        assert_eq!(report.portfolio_summary.current_value, dec!(500));
        assert_eq!(report.portfolio_summary.net_invested, dec!(450));
        assert_eq!(
            report.portfolio_summary.net_invested,
            report.funds.iter().map(|f| f.summary.net_invested).sum::<Decimal>()
        );

        // a: 2023 return from 10.00 to 15.00 with 10 opening shares
        assert_eq!(report.portfolio_yearly.len(), 1);
        assert_eq!(report.portfolio_yearly[0].year, 2023);
        assert_eq!(report.portfolio_yearly[0].return_pct, dec!(0.5));
    }

    #[test]
    fn test_transactions_after_as_of_are_ignored() {
        let ledger = ledger(vec![(
            "a",
            vec![
                buy("a", d(2023, 1, 1), dec!(1), dec!(-100)),
                buy("a", d(2024, 1, 1), dec!(1), dec!(-500)),
            ],
        )]);
        let options = AnalysisOptions {
            as_of: Some(d(2023, 6, 30)),
            ..AnalysisOptions::default()
        };
        let report = analyze(&ledger, &FundCatalog::default(), &options).unwrap();
        let a = report.fund("a").unwrap();
        assert_eq!(a.summary.net_invested, dec!(100));
        assert_eq!(a.summary.current_value, dec!(100));
    }

    #[test]
    fn test_fund_without_outflow_has_null_xirr_and_is_counted() {
        let mut deposit_only = buy("c", d(2023, 1, 1), dec!(0), dec!(50));
        deposit_only.kind = TransactionKind::Other;
        let ledger = ledger(vec![
            ("a", vec![buy("a", d(2023, 1, 1), dec!(1), dec!(-100))]),
            ("c", vec![deposit_only]),
        ]);
        let options = AnalysisOptions {
            as_of: Some(d(2024, 1, 1)),
            ..AnalysisOptions::default()
        };
        let report = analyze(&ledger, &FundCatalog::default(), &options).unwrap();
        assert!(report.fund("c").unwrap().summary.xirr.is_none());
        assert_eq!(report.diagnostics.insufficient_cash_flow, 1);
        assert!(report.fund("a").unwrap().summary.xirr.is_some());
    }

    #[test]
    fn test_total_loss_keeps_summary_without_xirr() {
        let ledger = ledger(vec![
            ("healthy", vec![buy("healthy", d(2023, 1, 1), dec!(10), dec!(-1000))]),
            ("loss", vec![buy("loss", d(2023, 1, 1), dec!(10), dec!(-1000))]),
        ]);
        let options = AnalysisOptions {
            as_of: Some(d(2024, 1, 1)),
            market_values: HashMap::from([
                ("healthy".to_string(), dec!(1100)),
                ("loss".to_string(), Decimal::ZERO),
            ]),
            xirr: XirrOptions::default(),
        };
        let report = analyze(&ledger, &FundCatalog::default(), &options).unwrap();

        let loss = report.fund("loss").unwrap();
        assert_eq!(loss.summary.net_invested, dec!(1000));
        assert_eq!(loss.summary.current_value, Decimal::ZERO);
        assert_eq!(loss.summary.total_gain, dec!(-1000));
        assert_eq!(loss.summary.total_return_pct, Some(dec!(-1)));
        assert_eq!(loss.summary.current_shares, Some(dec!(10)));
        assert_eq!(loss.summary.latest_price, Some(dec!(100)));
        assert!(loss.summary.xirr.is_none());
        assert!(matches!(
            loss.xirr_error,
            Some(AnalysisError::XirrNotConverged { .. })
        ));

        assert!(report.fund("healthy").unwrap().summary.xirr.is_some());
        assert_eq!(report.diagnostics.xirr_not_converged, 1);
        assert_eq!(report.diagnostics.insufficient_cash_flow, 0);
        assert_eq!(report.portfolio_summary.current_value, dec!(1100));
        assert!(report.portfolio_summary.xirr.is_some());
    }

    #[test]
    fn test_market_values_mapped_by_isin() {
        let catalog = FundCatalog::new(vec![fund_info("a", "IE0001"), fund_info("b", "IE0002")]);
        let values = vec![
            MarketValue {
                isin: "ie0002".into(),
                value: dec!(42),
            },
            MarketValue {
                isin: "XX9999".into(),
                value: dec!(1),
            },
        ];
        let mapped = market_values_by_slug(&catalog, &values);
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped.get("b"), Some(&dec!(42)));
    }
}
