// Reports module - per-fund reconstruction, returns and summaries

pub mod cashflow;
pub mod export;
pub mod holdings;
pub mod prices;
pub mod summary;
pub mod xirr;
pub mod yearly;

pub use cashflow::{assemble, transaction_cash_flows, AssembledCashFlows, CashFlow, Valuation};
pub use export::{snapshot_dir, write_reports};
pub use holdings::ShareHistory;
pub use prices::{reconstruct_prices, PriceObservation, PriceSeries};
pub use summary::{summarize, summarize_portfolio, InvestmentSummary, PORTFOLIO};
pub use xirr::{xirr, XirrOptions, XirrSolution};
pub use yearly::{
    fund_yearly_returns, portfolio_yearly_returns, FundYearlyReturn, PortfolioYearlyReturn,
};
