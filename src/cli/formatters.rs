//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::analysis::{AnalysisReport, Diagnostics};
use crate::ledger::{FundCatalog, NormalizedLedger};
use crate::reports::summary::InvestmentSummary;
use crate::reports::yearly::{FundYearlyReturn, PortfolioYearlyReturn};
use crate::utils::{format_amount, format_pct, format_price, format_rate};

fn signed_pct(value: Option<Decimal>) -> String {
    match value {
        Some(v) if v >= Decimal::ZERO => format_pct(v).green().to_string(),
        Some(v) => format_pct(v).red().to_string(),
        None => "N/A".to_string(),
    }
}

fn signed_rate(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 0.0 => format_rate(v).green().to_string(),
        Some(v) => format_rate(v).red().to_string(),
        None => "N/A".to_string(),
    }
}

/// Format an analysis for JSON output
pub fn format_analysis_json(report: &AnalysisReport, report_dir: Option<&Path>) -> String {
    #[derive(Serialize)]
    struct JsonFund<'a> {
        name: &'a str,
        #[serde(flatten)]
        summary: &'a InvestmentSummary,
        price_observations: usize,
        yearly_returns: &'a [FundYearlyReturn],
    }

    #[derive(Serialize)]
    struct JsonAnalysis<'a> {
        as_of: String,
        report_dir: Option<String>,
        funds: Vec<JsonFund<'a>>,
        portfolio: &'a InvestmentSummary,
        portfolio_yearly_returns: &'a [PortfolioYearlyReturn],
        diagnostics: &'a Diagnostics,
    }

    let doc = JsonAnalysis {
        as_of: report.as_of.to_string(),
        report_dir: report_dir.map(|p| p.display().to_string()),
        funds: report
            .funds
            .iter()
            .map(|f| JsonFund {
                name: &f.name,
                summary: &f.summary,
                price_observations: f.prices.len(),
                yearly_returns: &f.yearly,
            })
            .collect(),
        portfolio: &report.portfolio_summary,
        portfolio_yearly_returns: &report.portfolio_yearly,
        diagnostics: &report.diagnostics,
    };

    serde_json::to_string_pretty(&doc)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format an analysis for terminal table output
pub fn format_analysis_table(report: &AnalysisReport, written: &[PathBuf]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} Fund performance as of {}\n\n",
        "📊".cyan().bold(),
        report.as_of
    ));

    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "Fund")]
        fund: String,
        #[tabled(rename = "Shares")]
        shares: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Net Invested")]
        net_invested: String,
        #[tabled(rename = "Withdrawn")]
        withdrawn: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Return %")]
        return_pct: String,
        #[tabled(rename = "XIRR")]
        xirr: String,
    }

    let mut funds: Vec<_> = report.funds.iter().collect();
    funds.sort_by(|a, b| b.summary.current_value.cmp(&a.summary.current_value));

    let mut rows: Vec<SummaryRow> = funds
        .iter()
        .map(|f| {
            let s = &f.summary;
            SummaryRow {
                fund: f.name.clone(),
                shares: s
                    .current_shares
                    .map(|v| format!("{:.4}", v.round_dp(4)))
                    .unwrap_or_else(|| "N/A".to_string()),
                price: s
                    .latest_price
                    .map(format_price)
                    .unwrap_or_else(|| "N/A".to_string()),
                net_invested: format_amount(s.net_invested),
                withdrawn: format_amount(s.withdrawn),
                value: format_amount(s.current_value),
                return_pct: signed_pct(s.total_return_pct),
                xirr: signed_rate(s.xirr),
            }
        })
        .collect();

    let p = &report.portfolio_summary;
    rows.push(SummaryRow {
        fund: "Portfolio".bold().to_string(),
        shares: String::new(),
        price: String::new(),
        net_invested: format_amount(p.net_invested),
        withdrawn: format_amount(p.withdrawn),
        value: format_amount(p.current_value),
        return_pct: signed_pct(p.total_return_pct),
        xirr: signed_rate(p.xirr),
    });

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    if !report.portfolio_yearly.is_empty() {
        output.push_str(&format!("\n\n{} Portfolio yearly returns\n\n", "📅".cyan().bold()));

        #[derive(Tabled)]
        struct YearRow {
            #[tabled(rename = "Year")]
            year: i32,
            #[tabled(rename = "Opening Value")]
            opening_value: String,
            #[tabled(rename = "Funds")]
            funds: usize,
            #[tabled(rename = "Return")]
            return_pct: String,
        }

        let years: Vec<YearRow> = report
            .portfolio_yearly
            .iter()
            .map(|y| YearRow {
                year: y.year,
                opening_value: format_amount(y.opening_value),
                funds: y.funds_used,
                return_pct: signed_pct(Some(y.return_pct)),
            })
            .collect();

        let mut table = Table::new(&years);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
    }

    output.push_str(&format_diagnostics(&report.diagnostics));

    if !written.is_empty() {
        output.push_str(&format!("\n{} Reports written:\n", "✓".green().bold()));
        for path in written {
            output.push_str(&format!("  {}\n", path.display()));
        }
    }

    output
}

fn format_diagnostics(d: &Diagnostics) -> String {
    let mut output = format!("\n\n{} Diagnostics", "━".repeat(80).bright_black());
    output.push_str(&format!(
        "\n{:<26} {}",
        "Transactions:".bold(),
        d.transactions
    ));
    output.push_str(&format!("\n{:<26} {}", "Funds:".bold(), d.funds));
    output.push_str(&format!("\n{:<26} {}", "Account rows:".bold(), d.account_rows));

    let warn_count = |n: usize| {
        if n > 0 {
            n.to_string().yellow().to_string()
        } else {
            n.to_string()
        }
    };
    output.push_str(&format!(
        "\n{:<26} {}",
        "Unresolved rows:".bold(),
        warn_count(d.unresolved_rows)
    ));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Malformed rows:".bold(),
        warn_count(d.malformed_rows)
    ));
    output.push_str(&format!(
        "\n{:<26} {}\n",
        "Funds without XIRR:".bold(),
        warn_count(d.insufficient_cash_flow + d.xirr_not_converged)
    ));
    output
}

/// Format the normalizer diagnostics for JSON output
pub fn format_resolve_json(ledger: &NormalizedLedger, catalog: &FundCatalog) -> String {
    #[derive(Serialize)]
    struct JsonFund<'a> {
        fund: &'a str,
        name: &'a str,
        transactions: usize,
    }

    #[derive(Serialize)]
    struct JsonResolve<'a> {
        funds: Vec<JsonFund<'a>>,
        unresolved: Vec<String>,
        malformed: Vec<String>,
        account_rows: usize,
    }

    let doc = JsonResolve {
        funds: ledger
            .funds
            .iter()
            .map(|(slug, txs)| JsonFund {
                fund: slug,
                name: catalog.display_name(slug),
                transactions: txs.len(),
            })
            .collect(),
        unresolved: ledger.unresolved.iter().map(|e| e.to_string()).collect(),
        malformed: ledger.malformed.iter().map(|e| e.to_string()).collect(),
        account_rows: ledger.account_rows,
    };

    serde_json::to_string_pretty(&doc)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format the normalizer diagnostics for terminal output
pub fn format_resolve_table(ledger: &NormalizedLedger, catalog: &FundCatalog) -> String {
    let mut output = format!("\n{} Resolved funds\n\n", "🔎".cyan().bold());

    #[derive(Tabled)]
    struct FundRow {
        #[tabled(rename = "Slug")]
        slug: String,
        #[tabled(rename = "Fund")]
        name: String,
        #[tabled(rename = "Transactions")]
        transactions: usize,
    }

    let rows: Vec<FundRow> = ledger
        .funds
        .iter()
        .map(|(slug, txs)| FundRow {
            slug: slug.clone(),
            name: catalog.display_name(slug).to_string(),
            transactions: txs.len(),
        })
        .collect();

    if rows.is_empty() {
        output.push_str("No transactions resolved to a known fund\n");
    } else {
        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(2..), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    for (title, errors) in [
        ("Unresolved rows", &ledger.unresolved),
        ("Malformed rows", &ledger.malformed),
    ] {
        if errors.is_empty() {
            continue;
        }
        output.push_str(&format!(
            "\n{} {} ({})\n",
            "⚠".yellow().bold(),
            title,
            errors.len()
        ));
        for error in errors {
            output.push_str(&format!("  {}\n", error));
        }
    }

    output.push_str(&format!(
        "\n{} {} account rows without a security\n",
        "ℹ".blue().bold(),
        ledger.account_rows
    ));
    output
}
