//! Per-fund and portfolio investment summaries
//!
//! Net invested is the sign-flipped sum of capital outflows. Current value is
//! the terminal valuation appended to the cash-flow sequence, so a summary and
//! its XIRR always describe the same flows.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use super::cashflow::{assemble, total_inflows, total_outflows, CashFlow, Valuation};
use super::xirr::{xirr, XirrOptions};
use crate::error::AnalysisError;

/// Entity name used for the portfolio-level row
pub const PORTFOLIO: &str = "portfolio";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentSummary {
    pub entity: String,
    pub net_invested: Decimal,
    /// Sale proceeds and other inflows already received
    pub withdrawn: Decimal,
    pub current_value: Decimal,
    /// current_value + withdrawn - net_invested
    pub total_gain: Decimal,
    /// Fraction; `None` when nothing was invested
    pub total_return_pct: Option<Decimal>,
    pub xirr: Option<f64>,
    pub current_shares: Option<Decimal>,
    pub latest_price: Option<Decimal>,
}

/// Outcome of summarizing one entity: the row plus the reason XIRR is missing
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub summary: InvestmentSummary,
    pub xirr_error: Option<AnalysisError>,
}

/// Summarize one entity from its capital flows and terminal valuation.
///
/// XIRR failures leave `xirr` empty; they never abort the summary.
pub fn summarize(
    entity: &str,
    flows: Vec<CashFlow>,
    valuation: Valuation,
    options: &XirrOptions,
) -> SummaryOutcome {
    let net_invested = total_outflows(&flows);
    let withdrawn = total_inflows(&flows);
    let current_value = valuation.value;

    let total_return_pct = if net_invested.is_zero() {
        None
    } else {
        let pct = current_value
            .checked_div(net_invested)
            .and_then(|ratio| ratio.checked_sub(Decimal::ONE));
        if pct.is_none() {
            warn!("{}: total return is out of range", entity);
        }
        pct
    };

    let solved = assemble(entity, flows, valuation)
        .and_then(|assembled| xirr(entity, &assembled.with_terminal(), options));

    let (rate, xirr_error) = match solved {
        Ok(solution) => (Some(solution.rate), None),
        Err(e) => {
            warn!("{}: XIRR unavailable: {}", entity, e);
            (None, Some(e))
        }
    };

    SummaryOutcome {
        summary: InvestmentSummary {
            entity: entity.to_string(),
            net_invested,
            withdrawn,
            current_value,
            total_gain: current_value + withdrawn - net_invested,
            total_return_pct,
            xirr: rate,
            current_shares: None,
            latest_price: None,
        },
        xirr_error,
    }
}

/// Portfolio row: the union of every fund's flows, valued at the sum of the
/// funds' current values
pub fn summarize_portfolio<'a, I>(
    fund_flows: I,
    valuation: Valuation,
    options: &XirrOptions,
) -> SummaryOutcome
where
    I: IntoIterator<Item = &'a [CashFlow]>,
{
    let mut flows: Vec<CashFlow> = fund_flows.into_iter().flatten().copied().collect();
    flows.sort_by_key(|f| f.date);
    summarize(PORTFOLIO, flows, valuation, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flow(date: NaiveDate, amount: Decimal) -> CashFlow {
        CashFlow { date, amount }
    }

    #[test]
    fn test_buys_then_valuation() {
        let flows = vec![
            flow(d(2023, 1, 10), dec!(-1000)),
            flow(d(2023, 6, 10), dec!(-1200)),
        ];
        let valuation = Valuation {
            date: d(2024, 1, 10),
            value: dec!(2600),
        };
        let outcome = summarize("fund-a", flows, valuation, &XirrOptions::default());
        let s = outcome.summary;

        assert_eq!(s.net_invested, dec!(2200));
        assert_eq!(s.current_value, dec!(2600));
        assert_eq!(s.total_gain, dec!(400));
        let pct = s.total_return_pct.unwrap();
        assert!((pct - dec!(0.1818)).abs() < dec!(0.0001));
        assert!(s.xirr.unwrap() > 0.0);
        assert!(outcome.xirr_error.is_none());
    }

    #[test]
    fn test_sale_proceeds_count_as_withdrawn() {
        let flows = vec![
            flow(d(2022, 1, 1), dec!(-1000)),
            flow(d(2023, 1, 1), dec!(600)),
        ];
        let valuation = Valuation {
            date: d(2024, 1, 1),
            value: dec!(500),
        };
        let s = summarize("x", flows, valuation, &XirrOptions::default()).summary;
        assert_eq!(s.net_invested, dec!(1000));
        assert_eq!(s.withdrawn, dec!(600));
        assert_eq!(s.total_gain, dec!(100));
    }

    #[test]
    fn test_no_outflow_has_no_return() {
        let flows = vec![flow(d(2023, 1, 1), dec!(20))];
        let valuation = Valuation {
            date: d(2024, 1, 1),
            value: Decimal::ZERO,
        };
        let outcome = summarize("x", flows, valuation, &XirrOptions::default());
        assert_eq!(outcome.summary.net_invested, Decimal::ZERO);
        assert!(outcome.summary.total_return_pct.is_none());
        assert!(outcome.summary.xirr.is_none());
        assert!(matches!(
            outcome.xirr_error,
            Some(AnalysisError::InsufficientCashFlow { .. })
        ));
    }

    #[test]
    fn test_out_of_range_total_return_is_empty() {
        let flows = vec![flow(d(2023, 1, 1), dec!(-0.0000000001))];
        let valuation = Valuation {
            date: d(2024, 1, 1),
            value: dec!(100000000000000000000),
        };
        let s = summarize("x", flows, valuation, &XirrOptions::default()).summary;
        assert_eq!(s.net_invested, dec!(0.0000000001));
        assert!(s.total_return_pct.is_none());
    }

    #[test]
    fn test_portfolio_net_invested_is_sum_of_funds() {
        let a = vec![flow(d(2023, 1, 1), dec!(-1000)), flow(d(2023, 9, 1), dec!(100))];
        let b = vec![flow(d(2023, 3, 1), dec!(-400)), flow(d(2023, 4, 1), dec!(-250.5))];
        let valuation = Valuation {
            date: d(2024, 1, 1),
            value: dec!(1800),
        };

        let fund_a = summarize("a", a.clone(), valuation, &XirrOptions::default()).summary;
        let fund_b = summarize("b", b.clone(), valuation, &XirrOptions::default()).summary;
        let portfolio = summarize_portfolio(
            [a.as_slice(), b.as_slice()],
            valuation,
            &XirrOptions::default(),
        )
        .summary;

        assert_eq!(portfolio.entity, PORTFOLIO);
        assert_eq!(portfolio.net_invested, fund_a.net_invested + fund_b.net_invested);
        assert_eq!(portfolio.withdrawn, dec!(100));
        assert!(portfolio.xirr.is_some());
    }
}
