use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::models::Transaction;

/// Unit price inferred from a transaction's cash amount and share count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceObservation {
    pub fund: String,
    pub date: NaiveDate,
    pub implied_price: Decimal,
}

/// Date-ordered implied prices of one fund (at most one per date)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    pub fund: String,
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn latest(&self) -> Option<&PriceObservation> {
        self.observations.last()
    }

    /// Last observation dated on or before `date`, with its index
    pub fn last_on_or_before(&self, date: NaiveDate) -> Option<(usize, &PriceObservation)> {
        let end = self.observations.partition_point(|o| o.date <= date);
        end.checked_sub(1).map(|idx| (idx, &self.observations[idx]))
    }

    /// First observation dated on or after `date`, with its index
    pub fn first_on_or_after(&self, date: NaiveDate) -> Option<(usize, &PriceObservation)> {
        let idx = self.observations.partition_point(|o| o.date < date);
        self.observations.get(idx).map(|o| (idx, o))
    }

    /// Earliest observation year, if any
    pub fn first_year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.observations.first().map(|o| o.date.year())
    }
}

/// Reconstruct a fund's implied-price series.
///
/// Only settled transactions with a non-zero share count and a non-zero cash
/// amount contribute. Several transactions on one date collapse into a single
/// amount-weighted observation: `Σ|amount| / Σ|shares|`. A date whose price
/// cannot be represented as a positive decimal is dropped with a warning.
pub fn reconstruct_prices(fund: &str, transactions: &[Transaction]) -> PriceSeries {
    // None once a date's totals overflow
    let mut by_date: BTreeMap<NaiveDate, Option<(Decimal, Decimal)>> = BTreeMap::new();

    for tx in transactions.iter().filter(|tx| tx.is_settled()) {
        let (Some(shares), Some(amount)) = (tx.shares, tx.amount) else {
            continue;
        };
        if shares.is_zero() || amount.is_zero() {
            continue;
        }
        let entry = by_date
            .entry(tx.date)
            .or_insert(Some((Decimal::ZERO, Decimal::ZERO)));
        *entry = entry.and_then(|(total_amount, total_shares)| {
            Some((
                total_amount.checked_add(amount.abs())?,
                total_shares.checked_add(shares.abs())?,
            ))
        });
    }

    let observations = by_date
        .into_iter()
        .filter_map(|(date, totals)| {
            let price = totals
                .and_then(|(amount, shares)| amount.checked_div(shares))
                .filter(|price| *price > Decimal::ZERO);
            if price.is_none() {
                warn!("{}: implied price on {} is out of range, skipping", fund, date);
            }
            price.map(|implied_price| PriceObservation {
                fund: fund.to_string(),
                date,
                implied_price,
            })
        })
        .collect();

    PriceSeries {
        fund: fund.to_string(),
        observations,
    }
}
