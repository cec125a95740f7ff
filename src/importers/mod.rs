// Import module - broker transaction exports, fund metadata, market values

pub mod file_detector;
pub mod funds_list;
pub mod market_values;
pub mod transactions_csv;

pub use file_detector::{find_latest_transactions_file, snapshot_date_from_filename};
pub use funds_list::parse_funds_list;
pub use market_values::{parse_market_values, MarketValue};
pub use transactions_csv::{parse_transactions_csv, RawTransactionRow};
