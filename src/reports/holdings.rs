use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::Transaction;

/// Cumulative share count of a fund after each settled transaction date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShareHistory {
    points: Vec<(NaiveDate, Decimal)>,
}

impl ShareHistory {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for tx in transactions.iter().filter(|tx| tx.is_settled()) {
            *daily.entry(tx.date).or_insert(Decimal::ZERO) += tx.signed_shares();
        }

        let mut running = Decimal::ZERO;
        let points = daily
            .into_iter()
            .map(|(date, delta)| {
                running += delta;
                (date, running)
            })
            .collect();

        Self { points }
    }

    /// Shares held at the end of `date` (transactions on `date` included)
    pub fn shares_as_of(&self, date: NaiveDate) -> Decimal {
        let end = self.points.partition_point(|(d, _)| *d <= date);
        end.checked_sub(1)
            .map(|idx| self.points[idx].1)
            .unwrap_or(Decimal::ZERO)
    }

    /// Shares held after the last transaction
    pub fn current(&self) -> Decimal {
        self.points.last().map(|(_, s)| *s).unwrap_or(Decimal::ZERO)
    }
}
