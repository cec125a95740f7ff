//! Utility functions for formatting and common operations
//!
//! This module provides centralized formatting utilities for consistent
//! display of amounts and rates, plus fund-slug derivation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use unicode_normalization::UnicodeNormalization;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "€ " prefix
    Eur,
    /// No currency symbol (for table cells, calculations display)
    None,
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal value with `,` thousands separators and `.` as the
/// decimal separator, rounded to two places.
///
/// # Examples
/// ```
/// use fundtrack::utils::{format_amount_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_amount_with_width(dec!(1234.56), 0, CurrencySymbol::Eur),
///     "€ 1,234.56"
/// );
///
/// assert_eq!(
///     format_amount_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_amount_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", value.abs().round_dp(2));
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Eur => "€ ",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", prefix, sign, with_separators, decimal_part);

    if width > 0 && result.chars().count() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format as an amount with currency symbol: "€ 1,234.56"
///
/// # Examples
/// ```
/// use fundtrack::utils::format_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount(dec!(1234.56)), "€ 1,234.56");
/// assert_eq!(format_amount(dec!(-500)), "€ -500.00");
/// ```
pub fn format_amount(value: Decimal) -> String {
    format_amount_with_width(value, 0, CurrencySymbol::Eur)
}

/// Format a unit price without symbol, keeping four decimals
pub fn format_price(value: Decimal) -> String {
    format!("{:.4}", value.round_dp(4))
}

/// Format a fractional return as a percentage: 0.1818 → "18.18%"
///
/// # Examples
/// ```
/// use fundtrack::utils::format_pct;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_pct(dec!(0.181818)), "18.18%");
/// assert_eq!(format_pct(dec!(-0.05)), "-5.00%");
/// ```
pub fn format_pct(fraction: Decimal) -> String {
    match fraction.checked_mul(Decimal::ONE_HUNDRED) {
        Some(pct) => format!("{:.2}%", pct.round_dp(2)),
        None => format!("{:.2e}%", fraction.to_f64().unwrap_or(f64::NAN) * 100.0),
    }
}

/// Format an annualized rate (XIRR) as a percentage
pub fn format_rate(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// Derive a fund slug from a display name.
///
/// Converts to ASCII (dropping accents), lowercases, removes characters that
/// are not alphanumerics, underscores, hyphens or whitespace, then collapses
/// whitespace and hyphen runs into single hyphens.
///
/// # Examples
/// ```
/// use fundtrack::utils::slugify;
///
/// assert_eq!(slugify("iShares Core MSCI World (Acc)"), "ishares-core-msci-world-acc");
/// assert_eq!(slugify("  Société Générale -- Europe "), "societe-generale-europe");
/// ```
pub fn slugify(value: &str) -> String {
    let ascii: String = value
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase();

    let kept: String = ascii
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    kept.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches(|c: char| c == '-' || c == '_')
        .to_string()
}
