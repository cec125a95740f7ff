//! Error handling for fundtrack
//!
//! Defines the typed failure taxonomy of the analytics pipeline and
//! establishes a unified Result type using anyhow for context chaining.
//!
//! Row-level and entity-level variants are recovered locally by the pipeline
//! (collected, counted, or turned into `None` fields). Only the run-fatal
//! variants abort an invocation.

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for ledger normalization and return calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("unresolved transaction at row {row}: no fund matches name '{name}' / ISIN '{isin}'")]
    UnresolvedTransaction {
        row: usize,
        name: String,
        isin: String,
    },

    #[error("malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("insufficient cash flows for {entity}: {reason}")]
    InsufficientCashFlow { entity: String, reason: String },

    #[error("XIRR did not converge after {iterations} iterations (last rate {last_rate}, NPV residual {residual})")]
    XirrNotConverged {
        iterations: u32,
        last_rate: f64,
        residual: f64,
    },

    #[error("transactions file is missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("no usable transactions in ledger")]
    EmptyLedger,

    #[error("no transactions file matching {} in {}", .pattern, .dir.display())]
    NoTransactionFile { dir: PathBuf, pattern: String },
}

impl AnalysisError {
    /// Whether this error aborts the whole run rather than a single row or entity
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::MissingColumns(_)
                | AnalysisError::EmptyLedger
                | AnalysisError::NoTransactionFile { .. }
        )
    }
}

/// Result type alias for application operations
pub type Result<T> = anyhow::Result<T>;
