use anyhow::Context;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::{analyze, market_values_by_slug, AnalysisOptions};
use crate::cli::{formatters, Cli, Commands, InputArgs};
use crate::config::Config;
use crate::error::Result;
use crate::importers::{
    find_latest_transactions_file, parse_funds_list, parse_market_values, parse_transactions_csv,
    snapshot_date_from_filename,
};
use crate::ledger::{normalize, FundCatalog, NormalizedLedger};
use crate::reports::export::{snapshot_dir, write_reports};

/// Inputs after applying CLI overrides on top of the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    pub transactions_file: PathBuf,
    /// Date embedded in the export filename, if any
    pub snapshot: Option<NaiveDate>,
    pub funds_list: PathBuf,
}

pub fn resolve_inputs(args: &InputArgs, config: &Config) -> Result<ResolvedInputs> {
    let transactions_file = match &args.transactions_file {
        Some(path) => path.clone(),
        None => {
            let dir = args
                .transactions_dir
                .as_deref()
                .unwrap_or(&config.transactions_dir);
            find_latest_transactions_file(dir, &config.file_prefix)?
        }
    };
    let snapshot = snapshot_date_from_filename(&transactions_file, &config.file_prefix);

    Ok(ResolvedInputs {
        transactions_file,
        snapshot,
        funds_list: args
            .funds_list
            .clone()
            .unwrap_or_else(|| config.funds_list.clone()),
    })
}

fn load_ledger(inputs: &ResolvedInputs) -> Result<(NormalizedLedger, FundCatalog)> {
    let funds = parse_funds_list(&inputs.funds_list)
        .with_context(|| format!("Failed to load funds list {}", inputs.funds_list.display()))?;
    let catalog = FundCatalog::new(funds);

    info!("Reading transactions from {}", inputs.transactions_file.display());
    let rows = parse_transactions_csv(&inputs.transactions_file)?;
    let ledger = normalize(&rows, &catalog);
    Ok((ledger, catalog))
}

/// Execute a parsed command line
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Analyze {
            input,
            market_values,
            output_dir,
            as_of,
            dry_run,
        } => {
            let inputs = resolve_inputs(input, &config)?;
            let (ledger, catalog) = load_ledger(&inputs)?;

            let market_values = match market_values.as_ref().or(config.market_values.as_ref()) {
                Some(path) => market_values_by_slug(&catalog, &parse_market_values(path)?),
                None => Default::default(),
            };
            let options = AnalysisOptions {
                as_of: *as_of,
                market_values,
                xirr: config.xirr,
            };
            let report = analyze(&ledger, &catalog, &options)?;

            let (dir, written) = if *dry_run {
                (None, Vec::new())
            } else {
                let root: &Path = output_dir.as_deref().unwrap_or(&config.output_dir);
                let dir = snapshot_dir(root, inputs.snapshot.unwrap_or(report.as_of));
                let written = write_reports(&report, &dir)?;
                (Some(dir), written)
            };

            if cli.json {
                println!("{}", formatters::format_analysis_json(&report, dir.as_deref()));
            } else {
                print!("{}", formatters::format_analysis_table(&report, &written));
            }
            Ok(())
        }

        Commands::Resolve { input } => {
            let inputs = resolve_inputs(input, &config)?;
            let (ledger, catalog) = load_ledger(&inputs)?;

            if cli.json {
                println!("{}", formatters::format_resolve_json(&ledger, &catalog));
            } else {
                print!("{}", formatters::format_resolve_table(&ledger, &catalog));
            }
            Ok(())
        }
    }
}
