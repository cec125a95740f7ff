//! CSV report files
//!
//! One directory per snapshot date holding the five reports consumed by the
//! dashboard. Money is rounded to cents, prices and fractions to six places.

use anyhow::Context;
use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::AnalysisReport;
use crate::error::Result;

pub const FUND_PRICE_HISTORY: &str = "fund_price_history.csv";
pub const FUND_YEARLY_RETURNS: &str = "fund_yearly_returns.csv";
pub const PORTFOLIO_YEARLY_RETURNS: &str = "portfolio_yearly_returns.csv";
pub const FUND_INVESTMENT_SUMMARY: &str = "fund_investment_summary.csv";
pub const PORTFOLIO_INVESTMENT_SUMMARY: &str = "portfolio_investment_summary.csv";

fn money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded
}

fn ratio(value: Decimal) -> Decimal {
    value.round_dp(6).normalize()
}

#[derive(Serialize)]
struct PriceRow<'a> {
    fund: &'a str,
    fund_name: &'a str,
    date: NaiveDate,
    implied_price: Decimal,
}

#[derive(Serialize)]
struct FundYearlyRow<'a> {
    fund: &'a str,
    fund_name: &'a str,
    year: i32,
    start_date: NaiveDate,
    start_price: Decimal,
    end_date: NaiveDate,
    end_price: Decimal,
    return_pct: Decimal,
}

#[derive(Serialize)]
struct PortfolioYearlyRow {
    entity: &'static str,
    year: i32,
    opening_value: Decimal,
    funds_used: usize,
    /// `fund=weight` pairs joined with `;`
    weights: String,
    return_pct: Decimal,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    entity: &'a str,
    fund_name: &'a str,
    net_invested: Decimal,
    withdrawn: Decimal,
    current_value: Decimal,
    total_gain: Decimal,
    total_return_pct: Option<Decimal>,
    xirr: Option<f64>,
    current_shares: Option<Decimal>,
    latest_price: Option<Decimal>,
}

impl<'a> SummaryRow<'a> {
    fn new(fund_name: &'a str, s: &'a crate::reports::summary::InvestmentSummary) -> Self {
        Self {
            entity: &s.entity,
            fund_name,
            net_invested: money(s.net_invested),
            withdrawn: money(s.withdrawn),
            current_value: money(s.current_value),
            total_gain: money(s.total_gain),
            total_return_pct: s.total_return_pct.map(ratio),
            xirr: s.xirr,
            current_shares: s.current_shares,
            latest_price: s.latest_price.map(ratio),
        }
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// Directory the reports of one snapshot are written to
pub fn snapshot_dir(output_dir: &Path, snapshot: NaiveDate) -> PathBuf {
    output_dir.join(snapshot.format("%Y-%m-%d").to_string())
}

/// Write all five reports into `dir`, creating it if needed.
/// Returns the written file paths.
pub fn write_reports(report: &AnalysisReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let prices_path = dir.join(FUND_PRICE_HISTORY);
    write_rows(
        &prices_path,
        report.funds.iter().flat_map(|f| {
            f.prices.observations().iter().map(move |o| PriceRow {
                fund: &f.fund,
                fund_name: &f.name,
                date: o.date,
                implied_price: ratio(o.implied_price),
            })
        }),
    )?;

    let yearly_path = dir.join(FUND_YEARLY_RETURNS);
    write_rows(
        &yearly_path,
        report.funds.iter().flat_map(|f| {
            f.yearly.iter().map(move |y| FundYearlyRow {
                fund: &f.fund,
                fund_name: &f.name,
                year: y.year,
                start_date: y.start_date,
                start_price: ratio(y.start_price),
                end_date: y.end_date,
                end_price: ratio(y.end_price),
                return_pct: ratio(y.return_pct),
            })
        }),
    )?;

    let portfolio_yearly_path = dir.join(PORTFOLIO_YEARLY_RETURNS);
    write_rows(
        &portfolio_yearly_path,
        report.portfolio_yearly.iter().map(|p| PortfolioYearlyRow {
            entity: crate::reports::summary::PORTFOLIO,
            year: p.year,
            opening_value: money(p.opening_value),
            funds_used: p.funds_used,
            weights: p
                .weights
                .iter()
                .map(|w| format!("{}={}", w.fund, ratio(w.weight)))
                .join(";"),
            return_pct: ratio(p.return_pct),
        }),
    )?;

    let summary_path = dir.join(FUND_INVESTMENT_SUMMARY);
    write_rows(
        &summary_path,
        report
            .funds
            .iter()
            .sorted_by(|a, b| b.summary.current_value.cmp(&a.summary.current_value))
            .map(|f| SummaryRow::new(&f.name, &f.summary)),
    )?;

    let portfolio_summary_path = dir.join(PORTFOLIO_INVESTMENT_SUMMARY);
    write_rows(
        &portfolio_summary_path,
        std::iter::once(SummaryRow::new("Portfolio", &report.portfolio_summary)),
    )?;

    let written = vec![
        prices_path,
        yearly_path,
        portfolio_yearly_path,
        summary_path,
        portfolio_summary_path,
    ];
    info!("Wrote {} reports to {}", written.len(), dir.display());
    Ok(written)
}
