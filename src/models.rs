use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Settlement state of a broker event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Settled,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Settled => "SETTLED",
            TransactionStatus::Pending => "PENDING",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "settled" | "executed" => Ok(TransactionStatus::Settled),
            "pending" => Ok(TransactionStatus::Pending),
            _ => Err(()),
        }
    }
}

/// Classified transaction kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Buy,
    Sell,
    SavingsPlan,
    Deposit,
    TransferIn,  // In-kind share delivery, no cash effect
    TransferOut, // In-kind share removal, no cash effect
    Other,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::SavingsPlan => "SAVINGS_PLAN",
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::TransferIn => "TRANSFER_IN",
            TransactionKind::TransferOut => "TRANSFER_OUT",
            TransactionKind::Other => "OTHER",
        }
    }

    /// Classify the free-text `Type` column of a broker export.
    /// Never fails: anything unrecognized is `Other`.
    pub fn classify(text: &str) -> Self {
        let normalized = text
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ");
        match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "buy" | "purchase" => TransactionKind::Buy,
            "sell" | "sale" => TransactionKind::Sell,
            "savings plan" | "savingsplan" => TransactionKind::SavingsPlan,
            "deposit" => TransactionKind::Deposit,
            "transfer in" => TransactionKind::TransferIn,
            "transfer out" => TransactionKind::TransferOut,
            _ => TransactionKind::Other,
        }
    }

    /// +1 for kinds that add shares to a position, -1 for kinds that remove them
    pub fn share_direction(&self) -> i32 {
        match self {
            TransactionKind::Buy | TransactionKind::SavingsPlan | TransactionKind::TransferIn => 1,
            TransactionKind::Sell | TransactionKind::TransferOut => -1,
            TransactionKind::Deposit | TransactionKind::Other => 0,
        }
    }
}

/// One broker event, resolved to a fund
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Row number in the source file (1-indexed, header is row 1)
    pub row: usize,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub kind: TransactionKind,
    /// Canonical fund slug
    pub fund: String,
    pub name: String,
    pub isin: Option<String>,
    pub shares: Option<Decimal>,
    pub amount: Option<Decimal>,
}

impl Transaction {
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Settled
    }

    /// Share count change applied to the holding by this transaction
    pub fn signed_shares(&self) -> Decimal {
        let shares = self.shares.unwrap_or(Decimal::ZERO).abs();
        match self.kind.share_direction() {
            1 => shares,
            -1 => -shares,
            _ => Decimal::ZERO,
        }
    }

    /// Signed cash effect from the investor's point of view: purchases are
    /// negative, sales positive. `None` when the row carries no cash flow.
    pub fn cash_flow_amount(&self) -> Option<Decimal> {
        if !self.is_settled() {
            return None;
        }
        let amount = self.amount?;
        if amount.is_zero() {
            return None;
        }
        match self.kind {
            TransactionKind::Buy | TransactionKind::SavingsPlan | TransactionKind::Deposit => {
                Some(-amount.abs())
            }
            TransactionKind::Sell => Some(amount.abs()),
            TransactionKind::TransferIn | TransactionKind::TransferOut => None,
            TransactionKind::Other => Some(amount),
        }
    }
}

/// Fund metadata (one row of the funds list)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundInfo {
    pub slug: String,
    pub name: String,
    pub isin: String,
    pub ticker: Option<String>,
    pub alternative_isins: Vec<String>,
    pub tracked_index: Option<String>,
    pub additional_terms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tx(kind: TransactionKind, status: TransactionStatus, amount: Option<Decimal>) -> Transaction {
        Transaction {
            row: 2,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            status,
            kind,
            fund: "fund-x".to_string(),
            name: "Fund X".to_string(),
            isin: Some("IE00X".to_string()),
            shares: Some(dec!(3)),
            amount,
        }
    }

    #[test]
    fn test_classify_kinds() {
        assert_eq!(TransactionKind::classify("Buy"), TransactionKind::Buy);
        assert_eq!(TransactionKind::classify(" Savings plan "), TransactionKind::SavingsPlan);
        assert_eq!(TransactionKind::classify("SAVINGS_PLAN"), TransactionKind::SavingsPlan);
        assert_eq!(TransactionKind::classify("Transfer out"), TransactionKind::TransferOut);
        assert_eq!(TransactionKind::classify("Distribution"), TransactionKind::Other);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Settled".parse::<TransactionStatus>(), Ok(TransactionStatus::Settled));
        assert_eq!("PENDING".parse::<TransactionStatus>(), Ok(TransactionStatus::Pending));
        assert!("Cancelled".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_cash_flow_signs() {
        let buy = tx(TransactionKind::Buy, TransactionStatus::Settled, Some(dec!(-300)));
        assert_eq!(buy.cash_flow_amount(), Some(dec!(-300)));

        let deposit = tx(TransactionKind::Deposit, TransactionStatus::Settled, Some(dec!(500)));
        assert_eq!(deposit.cash_flow_amount(), Some(dec!(-500)));

        let sell = tx(TransactionKind::Sell, TransactionStatus::Settled, Some(dec!(-120)));
        assert_eq!(sell.cash_flow_amount(), Some(dec!(120)));

        let distribution = tx(TransactionKind::Other, TransactionStatus::Settled, Some(dec!(4.5)));
        assert_eq!(distribution.cash_flow_amount(), Some(dec!(4.5)));

        let pending = tx(TransactionKind::Buy, TransactionStatus::Pending, None);
        assert_eq!(pending.cash_flow_amount(), None);
    }

    #[test]
    fn test_signed_shares() {
        let sell = tx(TransactionKind::Sell, TransactionStatus::Settled, Some(dec!(100)));
        assert_eq!(sell.signed_shares(), dec!(-3));
        let deposit = tx(TransactionKind::Deposit, TransactionStatus::Settled, Some(dec!(100)));
        assert_eq!(deposit.signed_shares(), Decimal::ZERO);
    }
}
