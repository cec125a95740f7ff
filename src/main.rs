use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use fundtrack::cli::{runner, Cli};
use fundtrack::error::AnalysisError;

fn main() {
    // Logs go to stderr so `--json` output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = runner::run(&cli) {
        let kind = match err.downcast_ref::<AnalysisError>() {
            Some(e) if e.is_fatal() => "fatal",
            _ => "error",
        };
        eprintln!("{} {}: {:#}", "✗".red().bold(), kind, err);
        std::process::exit(1);
    }
}
