use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;
pub mod runner;

#[derive(Parser, Debug)]
#[command(name = "fundtrack")]
#[command(
    version,
    about = "Fund performance reconstruction from broker transaction exports"
)]
#[command(
    long_about = "Rebuild implied price histories, yearly returns, net invested capital and money-weighted returns (XIRR) per fund and for the whole portfolio, using nothing but a broker's transaction export."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Configuration file (defaults to $FUNDTRACK_CONFIG, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full analysis and write the report files
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Market values CSV (ISIN + "Market Value" column) overriding implied valuations
        #[arg(long, value_name = "PATH")]
        market_values: Option<PathBuf>,

        /// Root directory for reports (one subdirectory per snapshot date)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Valuation date (YYYY-MM-DD); defaults to the latest settled transaction
        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,

        /// Print results without writing report files
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show how export rows resolve to funds, without computing returns
    Resolve {
        #[command(flatten)]
        input: InputArgs,
    },
}

/// Where the transaction export and fund list come from
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Transaction export CSV; defaults to the newest dated export in the transactions dir
    #[arg(long, value_name = "PATH")]
    pub transactions_file: Option<PathBuf>,

    /// Directory scanned for dated exports
    #[arg(long, value_name = "DIR")]
    pub transactions_dir: Option<PathBuf>,

    /// Funds list CSV
    #[arg(long, value_name = "PATH")]
    pub funds_list: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_analyze_with_global_flags() {
        let cli = Cli::try_parse_from([
            "fundtrack",
            "analyze",
            "--as-of",
            "2024-06-01",
            "--json",
            "--transactions-file",
            "tx.csv",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Analyze { input, as_of, .. } => {
                assert_eq!(input.transactions_file, Some(PathBuf::from("tx.csv")));
                assert_eq!(as_of, NaiveDate::from_ymd_opt(2024, 6, 1));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn reject_invalid_as_of() {
        assert!(Cli::try_parse_from(["fundtrack", "analyze", "--as-of", "June"]).is_err());
    }
}
