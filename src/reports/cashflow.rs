use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AnalysisError;
use crate::models::Transaction;

/// Dated, signed cash flow: outflows (money invested) negative, inflows positive
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Value of an entity at the valuation instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Valuation {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// Cash-flow sequence ready for money-weighted return calculation
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledCashFlows {
    pub entity: String,
    /// Capital flows from transactions, ordered by date
    pub flows: Vec<CashFlow>,
    /// Synthetic terminal inflow
    pub terminal: CashFlow,
}

impl AssembledCashFlows {
    /// Transaction flows followed by the terminal valuation
    pub fn with_terminal(&self) -> Vec<CashFlow> {
        let mut all = self.flows.clone();
        all.push(self.terminal);
        all
    }
}

/// Sum of outflows, sign-flipped
pub fn total_outflows(flows: &[CashFlow]) -> Decimal {
    flows
        .iter()
        .filter(|f| f.amount < Decimal::ZERO)
        .map(|f| -f.amount)
        .sum()
}

/// Sum of inflows (sale proceeds, distributions)
pub fn total_inflows(flows: &[CashFlow]) -> Decimal {
    flows
        .iter()
        .filter(|f| f.amount > Decimal::ZERO)
        .map(|f| f.amount)
        .sum()
}

/// Capital flows of settled transactions, ordered by date (stable).
/// Pending rows and rows without a cash effect contribute nothing.
pub fn transaction_cash_flows<'a, I>(transactions: I) -> Vec<CashFlow>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut flows: Vec<CashFlow> = transactions
        .into_iter()
        .filter_map(|tx| {
            tx.cash_flow_amount().map(|amount| CashFlow {
                date: tx.date,
                amount,
            })
        })
        .collect();
    flows.sort_by_key(|f| f.date);
    flows
}

/// Append the terminal valuation to an entity's capital flows.
///
/// Fails with `InsufficientCashFlow` when there is no outflow: a
/// money-weighted return is undefined without at least one investment.
pub fn assemble(
    entity: &str,
    flows: Vec<CashFlow>,
    valuation: Valuation,
) -> Result<AssembledCashFlows, AnalysisError> {
    if !flows.iter().any(|f| f.amount < Decimal::ZERO) {
        return Err(AnalysisError::InsufficientCashFlow {
            entity: entity.to_string(),
            reason: "no settled outflow".to_string(),
        });
    }

    Ok(AssembledCashFlows {
        entity: entity.to_string(),
        flows,
        terminal: CashFlow {
            date: valuation.date,
            amount: valuation.value,
        },
    })
}
