//! Money-weighted return (XIRR)
//!
//! Finds the annual rate `r` with
//!
//! ```text
//! Σ cᵢ / (1 + r)^((tᵢ − t₀) / day_count) = 0
//! ```
//!
//! where `t₀` is the earliest flow date, using Newton's method from an initial
//! guess. Inputs are validated before iterating; non-convergence within the
//! iteration budget is reported as an error, never as a made-up rate.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::cashflow::CashFlow;
use crate::error::AnalysisError;

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XirrOptions {
    pub initial_guess: f64,
    pub max_iterations: u32,
    /// Convergence threshold on |NPV|
    pub tolerance: f64,
    /// Days per year used to turn date offsets into year fractions
    pub day_count: f64,
}

impl Default for XirrOptions {
    fn default() -> Self {
        Self {
            initial_guess: 0.1,
            max_iterations: 100,
            tolerance: 1e-6,
            day_count: 365.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XirrSolution {
    pub rate: f64,
    pub iterations: u32,
}

/// Check that a cash-flow sequence admits a money-weighted return
pub fn validate_flows(entity: &str, flows: &[CashFlow]) -> Result<(), AnalysisError> {
    let insufficient = |reason: &str| AnalysisError::InsufficientCashFlow {
        entity: entity.to_string(),
        reason: reason.to_string(),
    };

    if flows.len() < 2 {
        return Err(insufficient("fewer than two cash flows"));
    }
    if !flows.iter().any(|f| f.amount < Decimal::ZERO) {
        return Err(insufficient("no negative cash flow"));
    }
    if !flows.iter().any(|f| f.amount >= Decimal::ZERO) {
        return Err(insufficient("no non-negative cash flow"));
    }
    Ok(())
}

/// NPV and its derivative with respect to the rate
fn npv_and_derivative(points: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let base = 1.0 + rate;
    points.iter().fold((0.0, 0.0), |(npv, dnpv), (years, amount)| {
        let discount = base.powf(*years);
        (
            npv + amount / discount,
            dnpv - years * amount / (discount * base),
        )
    })
}

/// Solve for the money-weighted return of `flows`.
///
/// The returned rate is not clamped; callers decide how to present extreme
/// values.
pub fn xirr(
    entity: &str,
    flows: &[CashFlow],
    options: &XirrOptions,
) -> Result<XirrSolution, AnalysisError> {
    validate_flows(entity, flows)?;

    let Some(t0) = flows.iter().map(|f| f.date).min() else {
        return Err(AnalysisError::InsufficientCashFlow {
            entity: entity.to_string(),
            reason: "empty cash-flow sequence".to_string(),
        });
    };
    let points: Vec<(f64, f64)> = flows
        .iter()
        .map(|f| {
            let years = (f.date - t0).num_days() as f64 / options.day_count;
            (years, f.amount.to_f64().unwrap_or(0.0))
        })
        .collect();

    let mut rate = options.initial_guess;
    let mut residual = f64::NAN;

    for iteration in 0..options.max_iterations {
        let (npv, dnpv) = npv_and_derivative(&points, rate);
        residual = npv;

        if npv.abs() < options.tolerance {
            debug!("{}: XIRR {} after {} iterations", entity, rate, iteration);
            return Ok(XirrSolution {
                rate,
                iterations: iteration,
            });
        }
        if !npv.is_finite() || !dnpv.is_finite() || dnpv == 0.0 {
            break;
        }

        let mut next = rate - npv / dnpv;
        // (1 + r)^t is only real for r > -1: halve the distance to -1 instead
        if next <= -1.0 {
            next = (rate - 1.0) / 2.0;
        }
        rate = next;
    }

    let (npv, _) = npv_and_derivative(&points, rate);
    if npv.abs() < options.tolerance {
        return Ok(XirrSolution {
            rate,
            iterations: options.max_iterations,
        });
    }
    if npv.is_finite() {
        residual = npv;
    }

    Err(AnalysisError::XirrNotConverged {
        iterations: options.max_iterations,
        last_rate: rate,
        residual,
    })
}
