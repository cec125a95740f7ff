//! Fundtrack - fund performance reconstruction from broker transactions
//!
//! This library rebuilds implied price histories, calendar-year returns,
//! net invested capital and money-weighted returns (XIRR) per fund and for
//! the whole portfolio, using only a broker's transaction export and a fund
//! metadata list.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod importers;
pub mod ledger;
pub mod models;
pub mod reports;
pub mod utils;
