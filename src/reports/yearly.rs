//! Calendar-year returns from reconstructed price series
//!
//! A fund's year runs from its start anchor (last implied price on or before
//! January 1st, else the first one inside the year) to its end anchor (last
//! implied price on or before December 31st, capped at the valuation date).
//! Years whose two anchors are the same observation produce no record.
//!
//! Portfolio returns combine fund returns with opening-year weights: each
//! fund's opening value (shares held on January 1st × start price) divided by
//! the total opening value of the funds that have a return that year.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::prices::PriceSeries;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundYearlyReturn {
    pub year: i32,
    pub fund: String,
    pub start_date: NaiveDate,
    pub start_price: Decimal,
    pub end_date: NaiveDate,
    pub end_price: Decimal,
    /// Fraction, 0.05 = 5%
    pub return_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundWeight {
    pub fund: String,
    pub opening_value: Decimal,
    pub weight: Decimal,
    pub return_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioYearlyReturn {
    pub year: i32,
    pub return_pct: Decimal,
    pub opening_value: Decimal,
    pub funds_used: usize,
    pub weights: Vec<FundWeight>,
}

/// Yearly returns of one fund, from its first observation year up to the
/// valuation year
pub fn fund_yearly_returns(series: &PriceSeries, as_of: NaiveDate) -> Vec<FundYearlyReturn> {
    let Some(first_year) = series.first_year() else {
        return Vec::new();
    };

    (first_year..=as_of.year())
        .filter_map(|year| fund_return_for_year(series, year, as_of))
        .collect()
}

/// Return of one fund for one calendar year, `None` when fewer than two
/// distinct anchors exist
pub fn fund_return_for_year(
    series: &PriceSeries,
    year: i32,
    as_of: NaiveDate,
) -> Option<FundYearlyReturn> {
    let year_start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let year_end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    let end_point = year_end.min(as_of);
    if end_point < year_start {
        return None;
    }

    let (start_idx, start) = series.last_on_or_before(year_start).or_else(|| {
        series
            .first_on_or_after(year_start)
            .filter(|(_, o)| o.date <= end_point)
    })?;
    let (end_idx, end) = series.last_on_or_before(end_point)?;

    if end_idx <= start_idx || start.implied_price <= Decimal::ZERO {
        debug!("{} {}: not enough price anchors", series.fund, year);
        return None;
    }

    let Some(return_pct) = end
        .implied_price
        .checked_div(start.implied_price)
        .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
    else {
        warn!("{} {}: return is out of range, skipping", series.fund, year);
        return None;
    };

    Some(FundYearlyReturn {
        year,
        fund: series.fund.clone(),
        start_date: start.date,
        start_price: start.implied_price,
        end_date: end.date,
        end_price: end.implied_price,
        return_pct,
    })
}

/// Combine fund returns into portfolio returns with opening-year weights.
///
/// `opening_shares(fund, jan_1st)` gives the shares a fund held on January 1st.
/// Funds with no opening value are left out and the remaining weights are
/// renormalized; a year where no fund has an opening value yields no record.
pub fn portfolio_yearly_returns<F>(
    fund_returns: &[FundYearlyReturn],
    opening_shares: F,
) -> Vec<PortfolioYearlyReturn>
where
    F: Fn(&str, NaiveDate) -> Decimal,
{
    let mut by_year: BTreeMap<i32, Vec<&FundYearlyReturn>> = BTreeMap::new();
    for record in fund_returns {
        by_year.entry(record.year).or_default().push(record);
    }

    let mut out = Vec::new();
    for (year, records) in by_year {
        let Some(year_start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            continue;
        };

        let opening: Vec<(&FundYearlyReturn, Decimal)> = records
            .into_iter()
            .filter_map(|r| {
                let value = opening_shares(&r.fund, year_start).checked_mul(r.start_price);
                if value.is_none() {
                    warn!("{} {}: opening value is out of range, leaving it out", r.fund, year);
                }
                value.map(|v| (r, v))
            })
            .filter(|(_, value)| *value > Decimal::ZERO)
            .collect();

        let totals = opening.iter().try_fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(total, weighted), (r, v)| {
                Some((
                    total.checked_add(*v)?,
                    weighted.checked_add(v.checked_mul(r.return_pct)?)?,
                ))
            },
        );
        let Some((total, weighted_sum)) = totals else {
            warn!("{}: portfolio return is out of range, skipping", year);
            continue;
        };
        if total <= Decimal::ZERO {
            debug!("{}: no fund held at year start, skipping portfolio return", year);
            continue;
        }
        let Some(return_pct) = weighted_sum.checked_div(total) else {
            warn!("{}: portfolio return is out of range, skipping", year);
            continue;
        };

        let weights: Vec<FundWeight> = opening
            .iter()
            .map(|(r, value)| FundWeight {
                fund: r.fund.clone(),
                opening_value: *value,
                // value <= total, so the quotient is at most one
                weight: *value / total,
                return_pct: r.return_pct,
            })
            .collect();

        out.push(PortfolioYearlyReturn {
            year,
            return_pct,
            opening_value: total,
            funds_used: weights.len(),
            weights,
        });
    }

    out
}
